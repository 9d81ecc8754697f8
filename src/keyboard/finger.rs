use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Finger {
    LeftPinky,
    LeftRing,
    LeftMiddle,
    LeftIndex,
    LeftThumb,
    RightThumb,
    RightIndex,
    RightMiddle,
    RightRing,
    RightPinky,
    Unknown,
}

impl Hand {
    pub fn as_str(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
            Hand::Unknown => "unknown",
        }
    }
}

impl FromStr for Hand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Hand::Left),
            "right" => Ok(Hand::Right),
            "unknown" => Ok(Hand::Unknown),
            other => Err(format!("unknown hand '{other}'")),
        }
    }
}

impl Finger {
    pub const ALL: [Finger; 11] = [
        Finger::LeftPinky,
        Finger::LeftRing,
        Finger::LeftMiddle,
        Finger::LeftIndex,
        Finger::LeftThumb,
        Finger::RightThumb,
        Finger::RightIndex,
        Finger::RightMiddle,
        Finger::RightRing,
        Finger::RightPinky,
        Finger::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Finger::LeftPinky => "left_pinky",
            Finger::LeftRing => "left_ring",
            Finger::LeftMiddle => "left_middle",
            Finger::LeftIndex => "left_index",
            Finger::LeftThumb => "left_thumb",
            Finger::RightThumb => "right_thumb",
            Finger::RightIndex => "right_index",
            Finger::RightMiddle => "right_middle",
            Finger::RightRing => "right_ring",
            Finger::RightPinky => "right_pinky",
            Finger::Unknown => "unknown",
        }
    }

    pub fn hand(self) -> Hand {
        match self {
            Finger::LeftPinky
            | Finger::LeftRing
            | Finger::LeftMiddle
            | Finger::LeftIndex
            | Finger::LeftThumb => Hand::Left,
            Finger::RightThumb
            | Finger::RightIndex
            | Finger::RightMiddle
            | Finger::RightRing
            | Finger::RightPinky => Hand::Right,
            Finger::Unknown => Hand::Unknown,
        }
    }
}

impl FromStr for Finger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Finger::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown finger '{s}'"))
    }
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Finger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Finger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Hand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Hand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Standard touch-typing assignment. Characters off the main block map to
/// `Unknown` instead of a guessed finger.
pub fn qwerty_finger(ch: char) -> Finger {
    use Finger::*;

    match ch.to_ascii_lowercase() {
        'q' | 'a' | 'z' | '1' => LeftPinky,
        'w' | 's' | 'x' | '2' => LeftRing,
        'e' | 'd' | 'c' | '3' => LeftMiddle,
        'r' | 'f' | 'v' | 't' | 'g' | 'b' | '4' | '5' => LeftIndex,
        'y' | 'h' | 'n' | 'u' | 'j' | 'm' | '6' | '7' => RightIndex,
        'i' | 'k' | ',' | '8' => RightMiddle,
        'o' | 'l' | '.' | '9' => RightRing,
        'p' | ';' | '/' | '0' | '-' | '=' | '[' | ']' | '\'' | '\\' => RightPinky,
        ' ' => RightThumb,
        _ => Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finger_names_roundtrip() {
        for finger in Finger::ALL {
            assert_eq!(finger.as_str().parse::<Finger>().unwrap(), finger);
        }
    }

    #[test]
    fn serde_uses_store_vocabulary() {
        assert_eq!(serde_json::to_string(&Finger::LeftIndex).unwrap(), "\"left_index\"");
        let hand: Hand = serde_json::from_str("\"right\"").unwrap();
        assert_eq!(hand, Hand::Right);
        assert!(serde_json::from_str::<Finger>("\"left_toe\"").is_err());
    }

    #[test]
    fn hands_follow_finger_prefix() {
        assert_eq!(Finger::LeftThumb.hand(), Hand::Left);
        assert_eq!(Finger::RightPinky.hand(), Hand::Right);
        assert_eq!(Finger::Unknown.hand(), Hand::Unknown);
    }

    #[test]
    fn qwerty_map_covers_home_row_and_space() {
        assert_eq!(qwerty_finger('f'), Finger::LeftIndex);
        assert_eq!(qwerty_finger('J'), Finger::RightIndex);
        assert_eq!(qwerty_finger(' '), Finger::RightThumb);
        assert_eq!(qwerty_finger('é'), Finger::Unknown);
    }
}
