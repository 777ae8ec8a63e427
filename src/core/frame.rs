use crate::error::RenderError;

use log::*;

/// The device operations one frame iteration is made of. Slots are
/// indices into the frame slots, images are presentable image
/// indices.
pub trait FrameBackend {
    /// Blocks until the last submission made with `slot` completed.
    fn wait_for_slot(&mut self, slot: usize) -> Result<(), RenderError>;

    /// Acquires the next presentable image, signaling the slot's
    /// "image available" semaphore once it is ready.
    fn acquire_image(&mut self, slot: usize) -> Result<usize, RenderError>;

    /// Resets the slot's fence and submits the commands for `image`.
    fn submit(&mut self, slot: usize, image: usize) -> Result<(), RenderError>;

    fn present(&mut self, slot: usize, image: usize) -> Result<(), RenderError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Acquiring,
    Submitted,
    Presenting,
}

/// Rotates a fixed number of frame slots and tracks which slot last
/// submitted work for each presentable image.
#[derive(Clone, Debug)]
pub struct FrameSynchronizer {
    frame: usize,
    states: Vec<SlotState>,
    images_in_flight: Vec<Option<usize>>,
}

impl FrameSynchronizer {
    pub fn new(slot_count: usize, image_count: usize) -> Self {
        Self {
            frame: 0,
            states: vec![SlotState::Idle; slot_count.max(1)],
            images_in_flight: vec![None; image_count],
        }
    }

    /// Number of frames rendered so far.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn current_slot(&self) -> usize {
        self.frame % self.states.len()
    }

    pub fn slot_state(&self, slot: usize) -> SlotState {
        self.states[slot]
    }

    /// The slot whose submission last targeted `image`, if any.
    pub fn image_owner(&self, image: usize) -> Option<usize> {
        self.images_in_flight.get(image).copied().flatten()
    }

    /// The slot that last submitted work for `image`, when it is not
    /// `slot` itself.
    fn other_owner(&self, image: usize, slot: usize) -> Option<usize> {
        self.image_owner(image).filter(|&owner| owner != slot)
    }

    fn record_owner(&mut self, image: usize, slot: usize) {
        if image >= self.images_in_flight.len() {
            self.images_in_flight.resize(image + 1, None);
        }
        self.images_in_flight[image] = Some(slot);
    }

    /// Runs one acquire, submit and present cycle. The frame counter
    /// only advances when the whole cycle succeeded.
    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> Result<usize, RenderError> {
        let slot = self.current_slot();

        // Bounds how far the host can get ahead of the device: the
        // slot's semaphores and fence are free once its previous
        // submission completed.
        backend.wait_for_slot(slot)?;

        self.states[slot] = SlotState::Acquiring;
        let image = backend.acquire_image(slot)?;

        // With more images than slots (or an implementation that
        // returns images out of order), the image may still be in use
        // by the submission of another slot.
        if let Some(owner) = self.other_owner(image, slot) {
            trace!("Image {} still owned by slot {}, waiting.", image, owner);
            backend.wait_for_slot(owner)?;
        }

        self.states[slot] = SlotState::Submitted;
        backend.submit(slot, image)?;
        self.record_owner(image, slot);

        self.states[slot] = SlotState::Presenting;
        backend.present(slot, image)?;

        self.states[slot] = SlotState::Idle;
        self.frame += 1;
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulkanalia::prelude::v1_0::*;

    /// A device that retires work only when a fence is waited on, and
    /// checks on every submission that the synchronization held.
    struct MockDevice {
        slot_count: usize,
        // (slot, image) of every unretired submission.
        outstanding: Vec<(usize, usize)>,
        acquisitions: Vec<usize>,
        next: usize,
        max_outstanding: usize,
        submissions: usize,
        fail_acquire_at: Option<usize>,
        fail_submit_with: Option<vk::ErrorCode>,
        fail_present_with: Option<vk::ErrorCode>,
    }

    impl MockDevice {
        fn new(slot_count: usize, acquisitions: Vec<usize>) -> Self {
            Self {
                slot_count,
                outstanding: Vec::new(),
                acquisitions,
                next: 0,
                max_outstanding: 0,
                submissions: 0,
                fail_acquire_at: None,
                fail_submit_with: None,
                fail_present_with: None,
            }
        }

        fn round_robin(slot_count: usize, image_count: usize, frames: usize) -> Self {
            Self::new(slot_count, (0..frames).map(|i| i % image_count).collect())
        }
    }

    impl FrameBackend for MockDevice {
        fn wait_for_slot(&mut self, slot: usize) -> Result<(), RenderError> {
            self.outstanding.retain(|&(s, _)| s != slot);
            Ok(())
        }

        fn acquire_image(&mut self, _slot: usize) -> Result<usize, RenderError> {
            if self.fail_acquire_at == Some(self.next) {
                return Err(RenderError::SurfaceOutOfDate);
            }
            let image = self.acquisitions[self.next];
            self.next += 1;
            Ok(image)
        }

        fn submit(&mut self, slot: usize, image: usize) -> Result<(), RenderError> {
            if let Some(code) = self.fail_submit_with {
                return Err(RenderError::submission(code));
            }
            assert!(
                self.outstanding.iter().all(|&(s, _)| s != slot),
                "slot {} resubmitted before its fence was waited on",
                slot
            );
            assert!(
                self.outstanding.iter().all(|&(_, i)| i != image),
                "image {} submitted twice without a fence wait",
                image
            );

            self.outstanding.push((slot, image));
            self.max_outstanding = self.max_outstanding.max(self.outstanding.len());
            assert!(self.outstanding.len() <= self.slot_count);
            self.submissions += 1;
            Ok(())
        }

        fn present(&mut self, _slot: usize, _image: usize) -> Result<(), RenderError> {
            match self.fail_present_with {
                Some(code) => Err(RenderError::present(code)),
                None => Ok(()),
            }
        }
    }

    fn run(sync: &mut FrameSynchronizer, device: &mut MockDevice, frames: usize) {
        for _ in 0..frames {
            sync.draw_frame(device).unwrap();
        }
    }

    #[test]
    fn never_more_than_two_frames_in_flight() {
        for image_count in 1..=4 {
            let mut sync = FrameSynchronizer::new(2, image_count);
            let mut device = MockDevice::round_robin(2, image_count, 50);

            run(&mut sync, &mut device, 50);

            assert_eq!(device.submissions, 50);
            assert!(device.max_outstanding <= 2, "{} images", image_count);
        }
    }

    #[test]
    fn both_slots_overlap_when_images_allow_it() {
        let mut sync = FrameSynchronizer::new(2, 3);
        let mut device = MockDevice::round_robin(2, 3, 10);

        run(&mut sync, &mut device, 10);
        assert_eq!(device.max_outstanding, 2);
    }

    #[test]
    fn waits_for_the_owner_of_a_reacquired_image() {
        // Back to back acquisitions of the same image from different
        // slots: the second submission has to wait for the first.
        let acquisitions = vec![0, 0, 1, 1, 0, 2, 2, 1, 0, 0, 2, 2];
        let frames = acquisitions.len();
        let mut sync = FrameSynchronizer::new(2, 3);
        let mut device = MockDevice::new(2, acquisitions);

        run(&mut sync, &mut device, frames);
        assert_eq!(device.submissions, frames);
    }

    #[test]
    fn records_the_owning_slot_of_each_image() {
        let mut sync = FrameSynchronizer::new(2, 3);
        let mut device = MockDevice::new(2, vec![2, 0, 1]);

        assert_eq!(sync.image_owner(2), None);
        run(&mut sync, &mut device, 3);

        assert_eq!(sync.image_owner(2), Some(0));
        assert_eq!(sync.image_owner(0), Some(1));
        assert_eq!(sync.image_owner(1), Some(0));
    }

    #[test]
    fn slots_rotate_and_return_to_idle() {
        let mut sync = FrameSynchronizer::new(2, 3);
        let mut device = MockDevice::round_robin(2, 3, 5);

        for frame in 0..5 {
            assert_eq!(sync.current_slot(), frame % 2);
            assert_eq!(sync.draw_frame(&mut device).unwrap(), frame % 3);
            assert_eq!(sync.slot_state(0), SlotState::Idle);
            assert_eq!(sync.slot_state(1), SlotState::Idle);
        }
        assert_eq!(sync.frame(), 5);
    }

    #[test]
    fn failed_acquire_does_not_advance() {
        let mut sync = FrameSynchronizer::new(2, 3);
        let mut device = MockDevice::round_robin(2, 3, 5);
        device.fail_acquire_at = Some(2);

        run(&mut sync, &mut device, 2);
        assert!(matches!(sync.draw_frame(&mut device), Err(RenderError::SurfaceOutOfDate)));

        assert_eq!(sync.frame(), 2);
        assert_eq!(sync.slot_state(0), SlotState::Acquiring);
        assert_eq!(device.submissions, 2);
    }

    #[test]
    fn present_failures_surface_as_errors() {
        let mut sync = FrameSynchronizer::new(2, 3);
        let mut device = MockDevice::round_robin(2, 3, 2);
        device.fail_present_with = Some(vk::ErrorCode::DEVICE_LOST);

        assert!(matches!(sync.draw_frame(&mut device), Err(RenderError::DeviceLost)));
        assert_eq!(sync.slot_state(0), SlotState::Presenting);
        assert_eq!(sync.frame(), 0);
    }

    #[test]
    fn grows_the_image_map_for_unexpected_indices() {
        let mut sync = FrameSynchronizer::new(2, 2);
        let mut device = MockDevice::new(2, vec![0, 1, 3]);

        run(&mut sync, &mut device, 3);
        assert_eq!(sync.image_owner(3), Some(0));
    }

    #[test]
    fn failed_submission_leaves_ownership_untouched() {
        let mut sync = FrameSynchronizer::new(2, 3);
        let mut device = MockDevice::new(2, vec![1, 1]);

        run(&mut sync, &mut device, 1);
        assert_eq!(sync.image_owner(1), Some(0));

        device.fail_submit_with = Some(vk::ErrorCode::OUT_OF_DEVICE_MEMORY);
        assert!(matches!(
            sync.draw_frame(&mut device),
            Err(RenderError::Submission(vk::ErrorCode::OUT_OF_DEVICE_MEMORY))
        ));

        assert_eq!(sync.image_owner(1), Some(0));
        assert_eq!(sync.slot_state(1), SlotState::Submitted);
        assert_eq!(sync.frame(), 1);
    }
}
