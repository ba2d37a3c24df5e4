// crates/playback-engine/src/player/commands.rs
//
// Every control-thread mutation funnels through one of these (§4.I),
// queued to the worker thread over a bounded channel the same way
// `MediaWorker` hands scrub/playback requests to its decode threads.

use playback_core::compositor::{CompareMode, CompareTimeMode};
use playback_core::time::{RationalTime, TimeRange};

use crate::cache::CacheOptions;
use crate::player::state_machine::{LoopMode, Playback};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeAction {
    FrameNext,
    FramePrev,
    FrameNextX10,
    FramePrevX10,
    Start,
    End,
}

pub enum Command {
    SetPlayback(Playback),
    SetLoop(LoopMode),
    SetSpeed(f64),
    Seek(RationalTime),
    SetInOutRange(TimeRange),
    SetVideoLayer(usize),
    SetCompare(CompareMode),
    SetCompareTime(CompareTimeMode),
    SetVolume(f32),
    SetMute(bool),
    SetChannelMute { layer: usize, mask: Vec<bool> },
    SetAudioOffset(f64),
    SetCacheOptions(CacheOptions),
    TimeAction(TimeAction),
    ReportAudioDeviceFailure,
    Shutdown,
}
