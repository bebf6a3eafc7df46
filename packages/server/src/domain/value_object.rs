//! Value Objects for domain models.
//!
//! Value Objects are immutable objects that represent values in the domain.
//! They are compared by their value, not by identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::ValueObjectError;

/// Index of the active split.
///
/// `-1` means no split is active (timer not started).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SplitIndex(i64);

impl SplitIndex {
    /// No split active / timer not started.
    pub const NOT_STARTED: SplitIndex = SplitIndex(-1);

    /// The first split of a run.
    pub const FIRST: SplitIndex = SplitIndex(0);

    /// Create a new SplitIndex.
    ///
    /// # Errors
    ///
    /// Returns `ValueObjectError::SplitIndexOutOfRange` for values below -1
    pub fn new(index: i64) -> Result<Self, ValueObjectError> {
        if index < -1 {
            return Err(ValueObjectError::SplitIndexOutOfRange(index));
        }
        Ok(Self(index))
    }

    /// Get the inner value.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Whether this index denotes a started run.
    pub fn is_started(&self) -> bool {
        self.0 >= 0
    }
}

impl Default for SplitIndex {
    fn default() -> Self {
        Self::NOT_STARTED
    }
}

impl TryFrom<i64> for SplitIndex {
    type Error = ValueObjectError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SplitIndex> for i64 {
    fn from(index: SplitIndex) -> Self {
        index.0
    }
}

impl fmt::Display for SplitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one accepted browser connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(splitnotes_shared::time::get_unix_timestamp_millis())
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self` (negative if `earlier` is in the future).
    pub fn millis_since(&self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// TCP port in the application-bindable range (1024–65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    pub const MIN: u16 = 1024;
    pub const MAX: u16 = 65535;

    /// Default port of the desktop timer's command server.
    pub const DESKTOP_DEFAULT: Port = Port(16834);

    /// Default port of the browser-extension bridge.
    pub const BRIDGE_DEFAULT: Port = Port(16835);

    pub fn new(port: u16) -> Result<Self, ValueObjectError> {
        if port < Self::MIN {
            return Err(ValueObjectError::PortOutOfRange {
                min: Self::MIN,
                max: Self::MAX,
                actual: port,
            });
        }
        Ok(Self(port))
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Port {
    type Error = ValueObjectError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_index_accepts_not_started() {
        // テスト項目: -1 は「未開始」として受け入れられる
        // when (操作):
        let result = SplitIndex::new(-1);

        // then (期待する結果):
        assert_eq!(result, Ok(SplitIndex::NOT_STARTED));
        assert!(!SplitIndex::NOT_STARTED.is_started());
    }

    #[test]
    fn test_split_index_rejects_below_not_started() {
        // テスト項目: -2 以下はエラーになる
        // when (操作):
        let result = SplitIndex::new(-2);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::SplitIndexOutOfRange(-2)));
    }

    #[test]
    fn test_split_index_deserialize_validates() {
        // テスト項目: JSON からのデシリアライズでも範囲チェックされる
        // when (操作):
        let ok: Result<SplitIndex, _> = serde_json::from_str("3");
        let err: Result<SplitIndex, _> = serde_json::from_str("-5");

        // then (期待する結果):
        assert_eq!(ok.unwrap().value(), 3);
        assert!(err.is_err());
    }

    #[test]
    fn test_port_range() {
        // テスト項目: 1024 未満のポートは拒否される
        // when (操作):
        let low = Port::new(1023);
        let min = Port::new(1024);
        let max = Port::new(65535);

        // then (期待する結果):
        assert_eq!(
            low,
            Err(ValueObjectError::PortOutOfRange {
                min: 1024,
                max: 65535,
                actual: 1023
            })
        );
        assert_eq!(min.unwrap().value(), 1024);
        assert_eq!(max.unwrap().value(), 65535);
    }

    #[test]
    fn test_connection_id_uniqueness() {
        // テスト項目: ConnectionId::generate() は毎回異なる ID を生成する
        // when (操作):
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();

        // then (期待する結果):
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_timestamp_millis_since() {
        // テスト項目: 経過ミリ秒が計算できる
        // given (前提条件):
        let earlier = Timestamp::new(1_000);
        let later = Timestamp::new(6_100);

        // when (操作) / then (期待する結果):
        assert_eq!(later.millis_since(earlier), 5_100);
        assert_eq!(earlier.millis_since(later), -5_100);
    }
}
