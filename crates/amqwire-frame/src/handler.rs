use std::collections::VecDeque;

use crate::codec::Frame;

/// Receives frames from a [`FrameParser`](crate::FrameParser).
///
/// A handler that stops accepting makes the parser hold the next completed
/// frame and stop reading input until the handler accepts again.
pub trait FrameHandler<B> {
    /// Whether the handler can take a frame right now.
    fn is_accepting(&self) -> bool;

    /// Take ownership of a decoded frame.
    fn handle_frame(&mut self, frame: Frame<B>);
}

impl<B, H: FrameHandler<B> + ?Sized> FrameHandler<B> for &mut H {
    fn is_accepting(&self) -> bool {
        (**self).is_accepting()
    }

    fn handle_frame(&mut self, frame: Frame<B>) {
        (**self).handle_frame(frame);
    }
}

/// Collects every frame; always accepting.
impl<B> FrameHandler<B> for Vec<Frame<B>> {
    fn is_accepting(&self) -> bool {
        true
    }

    fn handle_frame(&mut self, frame: Frame<B>) {
        self.push(frame);
    }
}

/// Bounded frame queue that stops accepting when full.
#[derive(Debug, Clone)]
pub struct FrameQueue<B> {
    frames: VecDeque<Frame<B>>,
    capacity: usize,
}

impl<B> FrameQueue<B> {
    /// Create a queue holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Remove the oldest frame.
    pub fn pop(&mut self) -> Option<Frame<B>> {
        self.frames.pop_front()
    }

    /// Remove all queued frames in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = Frame<B>> + '_ {
        self.frames.drain(..)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the bound. Frames already queued are kept.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }
}

impl<B> FrameHandler<B> for FrameQueue<B> {
    fn is_accepting(&self) -> bool {
        self.frames.len() < self.capacity
    }

    fn handle_frame(&mut self, frame: Frame<B>) {
        self.frames.push_back(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_stops_accepting_at_capacity() {
        let mut queue = FrameQueue::new(2);
        assert!(queue.is_accepting());

        queue.handle_frame(Frame::new(1, "a"));
        queue.handle_frame(Frame::new(2, "b"));
        assert!(!queue.is_accepting());

        assert_eq!(queue.pop().map(|f| f.channel), Some(1));
        assert!(queue.is_accepting());
    }

    #[test]
    fn set_capacity_keeps_queued_frames() {
        let mut queue = FrameQueue::new(1);
        queue.handle_frame(Frame::new(1, ()));
        assert!(!queue.is_accepting());

        queue.set_capacity(3);
        assert_eq!(queue.capacity(), 3);
        assert!(queue.is_accepting());

        queue.set_capacity(0);
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_accepting());
    }

    #[test]
    fn zero_capacity_never_accepts() {
        let queue = FrameQueue::<()>::new(0);
        assert!(!queue.is_accepting());
    }

    #[test]
    fn drain_preserves_order() {
        let mut queue = FrameQueue::new(4);
        for channel in 0..3 {
            queue.handle_frame(Frame::new(channel, ()));
        }

        let channels: Vec<u16> = queue.drain().map(|f| f.channel).collect();
        assert_eq!(channels, vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn vec_always_accepts() {
        let mut frames: Vec<Frame<()>> = Vec::new();
        assert!(frames.is_accepting());
        frames.handle_frame(Frame::empty(9));
        assert_eq!(frames.len(), 1);
    }
}
