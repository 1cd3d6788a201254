//! Rolling cache of recent preview frames drained into moving-photo clips.

mod drain;
mod frame;
mod listener;
mod task_manager;
mod video_cache;

pub use drain::{DrainImageCallback, DrainImageManager, SessionDrainImageCallback};
pub use frame::{FrameRecord, FrameStatus};
pub use listener::MovingPhotoListener;
pub use task_manager::{DiscardEncoder, MovingPhotoEncoder, TaskManager};
pub use video_cache::{CachedFrameCallbackHandle, MovingPhotoVideoCache};
