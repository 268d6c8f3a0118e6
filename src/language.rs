//! Languages and translation directions.

use std::fmt;

use crate::gpio::Level;

/// A language the appliance can hear and speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Vietnamese,
    English,
}

impl Language {
    /// ISO-639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            Language::Vietnamese => "vi",
            Language::English => "en",
        }
    }

    /// English name, used in translation prompts.
    pub fn name(self) -> &'static str {
        match self {
            Language::Vietnamese => "Vietnamese",
            Language::English => "English",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Translation direction, latched from the mode pin at trigger time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Vietnamese speech in, English speech out.
    ViToEn,
    /// English speech in, Vietnamese speech out.
    EnToVi,
}

impl Direction {
    /// The mode pin is active-low: Low selects Vietnamese → English.
    ///
    /// ```
    /// use voice_translate::gpio::Level;
    /// use voice_translate::language::Direction;
    ///
    /// assert_eq!(Direction::from_mode_level(Level::Low), Direction::ViToEn);
    /// assert_eq!(Direction::from_mode_level(Level::High), Direction::EnToVi);
    /// ```
    pub fn from_mode_level(level: Level) -> Self {
        match level {
            Level::Low => Direction::ViToEn,
            Level::High => Direction::EnToVi,
        }
    }

    /// Language recognised from the microphone.
    pub fn source(self) -> Language {
        match self {
            Direction::ViToEn => Language::Vietnamese,
            Direction::EnToVi => Language::English,
        }
    }

    /// Language synthesised to the speaker.
    pub fn target(self) -> Language {
        match self {
            Direction::ViToEn => Language::English,
            Direction::EnToVi => Language::Vietnamese,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}2{}", self.source(), self.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_and_target_differ() {
        for d in [Direction::ViToEn, Direction::EnToVi] {
            assert_ne!(d.source(), d.target());
        }
    }

    #[test]
    fn display_matches_log_format() {
        assert_eq!(Direction::ViToEn.to_string(), "vi2en");
        assert_eq!(Direction::EnToVi.to_string(), "en2vi");
    }
}
