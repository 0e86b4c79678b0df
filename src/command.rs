//! `/video` chat command parsing
//!
//! ```text
//! /video                                    help
//! /video list                               numbered video list
//! /video stop                               stop playback for this chat
//! /video play <name|number> [width height]  play a video
//! ```
//!
//! Arguments are split with POSIX shell rules by [`shlex`]: single and double
//! quotes group words, and a backslash escapes the next character outside
//! single quotes. Unbalanced quotes and a trailing backslash are rejected.

use std::ops::RangeInclusive;

use crate::types::RenderSize;
use crate::{PlayerError, Result};

/// Command prefix.
pub const COMMAND_PREFIX: &str = "/video";

/// Accepted render widths; requests outside are clamped.
pub const WIDTH_RANGE: RangeInclusive<u32> = 10..=100;

/// Accepted render heights; requests outside are clamped.
pub const HEIGHT_RANGE: RangeInclusive<u32> = 5..=50;

macro_rules! command_list {
    () => {
        concat!(
            "  list - list available videos with their numbers\n",
            "  stop - stop the current playback\n",
            "  play <name or number> [width] [height] - play a video",
        )
    };
}

pub const HELP_TEXT: &str = concat!(
    "Usage: /video <command> [args]\nCommands:\n",
    command_list!(),
    "\nTip: use /video list to see the video numbers"
);

pub const UNKNOWN_COMMAND_TEXT: &str =
    concat!("Unknown command. Available commands:\n", command_list!());

pub const PLAY_USAGE: &str = "Usage: /video play <name or number> [width] [height]\n\
                              Tip: quote file names that contain spaces";

pub const QUOTE_ERROR: &str = "Malformed command, check that quotes are balanced";

pub const SIZE_ERROR: &str = "Width and height must be numbers";

/// Which video to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSelector {
    /// 1-based position in the library listing
    Index(usize),
    /// File name inside the library
    Name(String),
}

/// A parsed `/video` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoCommand {
    Help,
    List,
    Stop,
    Play { video: VideoSelector, size: Option<RenderSize> },
    Unknown(String),
}

/// Parse a chat message.
///
/// Returns `Ok(None)` when the message is not a `/video` command, and
/// [`PlayerError::InvalidCommand`] carrying the reply text when it is one but
/// is malformed.
pub fn parse(text: &str) -> Result<Option<VideoCommand>> {
    let text = text.trim();
    let Some(rest) = text.strip_prefix(COMMAND_PREFIX) else {
        return Ok(None);
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Ok(None);
    }

    let args = shlex::split(rest).ok_or_else(|| PlayerError::invalid_command(QUOTE_ERROR))?;
    let Some((subcommand, args)) = args.split_first() else {
        return Ok(Some(VideoCommand::Help));
    };

    let command = match subcommand.as_str() {
        "list" => VideoCommand::List,
        "stop" => VideoCommand::Stop,
        "play" => parse_play(args)?,
        other => VideoCommand::Unknown(other.to_string()),
    };
    Ok(Some(command))
}

fn parse_play(args: &[String]) -> Result<VideoCommand> {
    let Some(identifier) = args.first() else {
        return Err(PlayerError::invalid_command(PLAY_USAGE));
    };

    let video = if !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit()) {
        let index = identifier.parse().map_err(|_| PlayerError::invalid_command(PLAY_USAGE))?;
        VideoSelector::Index(index)
    } else {
        VideoSelector::Name(identifier.clone())
    };

    // A lone width without a height is ignored
    let size = match (args.get(1), args.get(2)) {
        (Some(width), Some(height)) => Some(parse_size(width, height)?),
        _ => None,
    };

    Ok(VideoCommand::Play { video, size })
}

fn parse_size(width: &str, height: &str) -> Result<RenderSize> {
    let parse = |value: &str| value.parse::<i64>().map_err(|_| PlayerError::invalid_command(SIZE_ERROR));
    let clamp = |value: i64, range: &RangeInclusive<u32>| {
        value.clamp(i64::from(*range.start()), i64::from(*range.end())) as u32
    };

    Ok(RenderSize::new(clamp(parse(width)?, &WIDTH_RANGE), clamp(parse(height)?, &HEIGHT_RANGE)))
}
