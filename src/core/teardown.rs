use log::*;

type Action = Box<dyn FnOnce()>;

/// Reverse-construction stack of destroy actions.
///
/// Every create step pushes the action that undoes it, so objects
/// are always destroyed in the inverse order of their creation: an
/// object can only reference objects created before it, which are
/// still alive when it is destroyed. Whatever is left on the stack
/// when it is dropped is unwound at that point, which also covers
/// an initialization that fails half-way through.
#[derive(Default)]
pub struct Teardown {
    actions: Vec<(&'static str, Action)>,
}

impl Teardown {
    pub fn push(&mut self, label: &'static str, action: impl FnOnce() + 'static) {
        self.actions.push((label, Box::new(action)));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Labels of the pending actions, in the order they were pushed.
    pub fn labels(&self) -> Vec<&'static str> {
        self.actions.iter().map(|(label, _)| *label).collect()
    }

    /// Runs every pending action, most recent first.
    ///
    /// The caller must make sure the device is idle before unwinding
    /// anything that the device could still be using.
    pub fn unwind(&mut self) {
        while let Some((label, action)) = self.actions.pop() {
            action();
            debug!("Destroyed {}.", label);
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            warn!("Unwinding {} leftover objects.", self.actions.len());
            self.unwind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn recording(log: &Rc<RefCell<Vec<&'static str>>>, label: &'static str) -> impl FnOnce() {
        let log = Rc::clone(log);
        move || log.borrow_mut().push(label)
    }

    #[test]
    fn unwinds_in_reverse_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut teardown = Teardown::default();

        for label in ["instance", "surface", "device", "swapchain", "pipeline"] {
            teardown.push(label, recording(&log, label));
        }
        assert_eq!(teardown.len(), 5);

        teardown.unwind();
        assert!(teardown.is_empty());
        assert_eq!(
            *log.borrow(),
            vec!["pipeline", "swapchain", "device", "surface", "instance"]
        );
    }

    #[test]
    fn actions_run_exactly_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut teardown = Teardown::default();
        teardown.push("fence", recording(&log, "fence"));

        teardown.unwind();
        teardown.unwind();
        drop(teardown);

        assert_eq!(*log.borrow(), vec!["fence"]);
    }

    #[test]
    fn drop_unwinds_partial_construction() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let build = |fail_at: usize| -> Result<Teardown, ()> {
            let mut teardown = Teardown::default();
            for (step, label) in ["instance", "device", "swapchain"].into_iter().enumerate() {
                if step == fail_at {
                    return Err(());
                }
                teardown.push(label, recording(&log, label));
            }
            Ok(teardown)
        };

        assert!(build(2).is_err());
        assert_eq!(*log.borrow(), vec!["device", "instance"]);
    }

    #[test]
    fn captured_handles_live_until_their_action_runs() {
        // Stands in for the loader: the first action owns it, and the
        // later actions must still run while it is alive.
        let library = Rc::new(());
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let mut teardown = Teardown::default();
            teardown.push("instance", {
                let library = Rc::clone(&library);
                let log = Rc::clone(&log);
                move || {
                    log.borrow_mut().push(("instance", Rc::strong_count(&library)));
                    drop(library);
                }
            });
            for label in ["surface", "device"] {
                let library = Rc::downgrade(&library);
                let log = Rc::clone(&log);
                teardown.push(label, move || {
                    log.borrow_mut().push((label, library.strong_count()));
                });
            }

            // What the caller owned goes away before the stack does.
            drop(library);
            assert_eq!(teardown.labels(), vec!["instance", "surface", "device"]);
        }

        assert_eq!(*log.borrow(), vec![("device", 1), ("surface", 1), ("instance", 1)]);
    }
}
