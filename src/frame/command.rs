//! Per-slot command recording context.

use glam::Vec4;

use crate::scene::{DrawArgs, GeometryHandle, PipelineHandle, TextureHandle};

/// Back buffer usage state for transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Present,
    RenderTarget,
}

/// Where a draw reads its vertices from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSource {
    /// Immutable geometry uploaded at scene build time
    Static(GeometryHandle),
    /// The dynamic vertex region of the given slot
    Dynamic { slot: usize },
}

/// One indexed draw of a render item.
///
/// Uniform indices refer to the regions of the slot the command list belongs
/// to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub object_index: usize,
    pub material_index: usize,
    pub texture: Option<TextureHandle>,
    pub vertices: VertexSource,
    pub args: DrawArgs,
}

/// Recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Transition {
        before: ResourceState,
        after: ResourceState,
    },
    Clear(Vec4),
    /// Bind the pass constants of `slot`
    BindPass {
        slot: usize,
    },
    SetPipeline(PipelineHandle),
    Draw(DrawCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RecordingState {
    #[default]
    Initial,
    Recording,
    Closed,
}

/// Command list owned by one frame slot.
///
/// The list's memory is reused frame after frame; [`begin`](Self::begin) must
/// only be called once the slot's previous submission has retired, which the
/// ring guarantees for the slot it hands out.
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<Command>,
    state: RecordingState,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset and start recording.
    pub fn begin(&mut self) {
        self.commands.clear();
        self.state = RecordingState::Recording;
    }

    /// Append a command.
    ///
    /// # Panics
    ///
    /// Panics if the list is not recording.
    pub fn push(&mut self, command: Command) {
        assert_eq!(
            self.state,
            RecordingState::Recording,
            "command list is not recording"
        );
        self.commands.push(command);
    }

    /// Finish recording.
    ///
    /// # Panics
    ///
    /// Panics if the list is not recording.
    pub fn close(&mut self) {
        assert_eq!(
            self.state,
            RecordingState::Recording,
            "command list is not recording"
        );
        self.state = RecordingState::Closed;
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub fn is_closed(&self) -> bool {
        self.state == RecordingState::Closed
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_close() {
        let mut list = CommandList::new();
        assert!(!list.is_recording());

        list.begin();
        list.push(Command::Clear(Vec4::ONE));
        list.push(Command::BindPass { slot: 0 });
        list.close();

        assert!(list.is_closed());
        assert_eq!(list.len(), 2);
        assert_eq!(list.draw_count(), 0);
    }

    #[test]
    fn test_begin_resets_previous_frame() {
        let mut list = CommandList::new();
        list.begin();
        list.push(Command::Clear(Vec4::ZERO));
        list.close();

        list.begin();
        assert!(list.is_empty());
        assert!(list.is_recording());
    }

    #[test]
    #[should_panic(expected = "command list is not recording")]
    fn test_push_after_close_panics() {
        let mut list = CommandList::new();
        list.begin();
        list.close();
        list.push(Command::Clear(Vec4::ZERO));
    }
}
