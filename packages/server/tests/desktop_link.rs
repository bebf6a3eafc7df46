//! Desktop polling through a real link against a fake timer.

mod fixtures;

use std::{sync::Arc, time::Duration};

use fixtures::FakeDesktop;
use splitnotes_bridge::{
    domain::{DesktopEndpoint, MergeOutcome, Port, SplitIndex},
    infrastructure::desktop::LiveSplitLink,
    ui::SyncScheduler,
    usecase::{StateReconciler, TickOutcome},
};

#[tokio::test]
async fn test_unanswered_split_name_keeps_desktop_connected() {
    // テスト項目: スプリット名に応答しない Desktop でも接続断として扱われず、実行中の状態が維持される
    // given (前提条件):
    let desktop = FakeDesktop::start(19801, 2).await;
    desktop.mute_split_names();
    let reconciler = Arc::new(StateReconciler::new());
    let mut notifications = reconciler.subscribe();
    let (mut scheduler, _control) = SyncScheduler::new(
        Box::new(LiveSplitLink::new(Duration::from_millis(100))),
        reconciler.clone(),
        DesktopEndpoint::new("127.0.0.1", Port::new(19801).unwrap()),
        Duration::from_millis(50),
    );
    assert_eq!(scheduler.tick_once().await, TickOutcome::Connected);

    // when (操作):
    let started = scheduler.tick_once().await;
    let mut later = Vec::new();
    for _ in 0..3 {
        later.push(scheduler.tick_once().await);
    }
    desktop.set_index(3);
    let advanced = scheduler.tick_once().await;
    let settled = scheduler.tick_once().await;

    // then (期待する結果):
    assert!(matches!(started, TickOutcome::Polled(MergeOutcome::Changed(_))));
    assert!(
        later
            .iter()
            .all(|outcome| *outcome == TickOutcome::Polled(MergeOutcome::Unchanged)),
        "unexpected outcomes: {later:?}"
    );
    assert!(matches!(advanced, TickOutcome::Polled(MergeOutcome::Changed(_))));
    assert_eq!(settled, TickOutcome::Polled(MergeOutcome::Unchanged));

    let state = reconciler.snapshot().await;
    assert!(state.desktop_connected);
    assert!(state.timer_running);
    assert_eq!(state.active_split_index, SplitIndex::new(3).unwrap());
    assert_eq!(state.current_split_name, None);

    // 通知は開始と前進の 2 回のみで、停止への遷移は含まれない
    let mut seen = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        seen.push(notification.state);
    }
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|state| state.timer_running));
    assert_eq!(seen[0].active_split_index, SplitIndex::new(2).unwrap());
    assert_eq!(seen[1].active_split_index, SplitIndex::new(3).unwrap());
}
