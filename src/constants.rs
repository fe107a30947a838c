//! Configuration constants for the azkviz game system
//!
//! This module contains the numeric limits and drawing constants used
//! throughout the crate, grouped by the component they constrain.

/// Board drawing constants
pub mod board {
    /// Circumradius of one hex tile in SVG user units
    pub const TILE_SIZE: f64 = 11.0;
}

/// Player name constraints
pub mod player_name {
    /// Maximum length of a display name in characters
    pub const MAX_LENGTH: usize = 30;
}

/// Answer text constraints
pub mod answer_text {
    /// Maximum length of a submitted answer in characters
    pub const MAX_LENGTH: usize = 200;
    /// Separator between question text and accepted answers in the
    /// delimited wire form
    pub const DELIMITER: char = '|';
}

/// Room code constraints
pub mod room_code {
    /// Maximum length of a room code
    pub const MAX_LENGTH: usize = 16;
}
