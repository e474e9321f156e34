// SPDX-License-Identifier: GPL-3.0-only
//! Fixed gst-launch command lines for both modes

use crate::config::{
    AUDIO_CHANNELS, AUDIO_RATE, CAPTURE_FRAMERATE, DEVICE_PATH, OUTPUT_HEIGHT, OUTPUT_WIDTH,
    STANDBY_FONT, STANDBY_MESSAGE,
};

/// Makes the bridge latch the timings it currently detects
pub const APPLY_TIMINGS_COMMAND: &str =
    "v4l2-ctl --query-dv-timings && v4l2-ctl --set-dv-bt-timings query";

/// Live capture: HDMI video scaled to the framebuffer plus audio passthrough
pub fn capture_command(renderer: &str) -> String {
    format!(
        "{renderer} v4l2src device={device} \
         ! video/x-raw,framerate={fps}/1,format=UYVY,colorimetry=bt601 \
         ! v4l2convert ! videoscale \
         ! video/x-raw,width={width},height={height} \
         ! fbdevsink async=false sync=false \
         alsasrc ! audio/x-raw,rate={rate},channels={channels} ! pulsesink",
        renderer = shell_quote(renderer),
        device = DEVICE_PATH,
        fps = CAPTURE_FRAMERATE,
        width = OUTPUT_WIDTH,
        height = OUTPUT_HEIGHT,
        rate = AUDIO_RATE,
        channels = AUDIO_CHANNELS,
    )
}

/// Standby: snow pattern with a centered message
pub fn standby_command(renderer: &str) -> String {
    format!(
        "{renderer} videotestsrc pattern=snow \
         ! video/x-raw,width={width},height={height} \
         ! textoverlay text=\"{message}\" valignment=center halignment=center font-desc=\"{font}\" \
         ! fbdevsink",
        renderer = shell_quote(renderer),
        width = OUTPUT_WIDTH,
        height = OUTPUT_HEIGHT,
        message = STANDBY_MESSAGE,
        font = STANDBY_FONT,
    )
}

/// Quote a path for `sh -c` when it contains anything unusual
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '+'));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
