use std::cell::RefCell;
use std::rc::Rc;

use crate::capture::CapturedImage;

#[derive(Debug)]
struct SessionState {
    document_id: String,
    page_count: Option<u32>,
    current_page: u32,
    panel_open: bool,
    capture_mode: bool,
    captured_image: Option<CapturedImage>,
}

/// Page and panel state for one open document, shared by the viewer and the
/// assistant panel. UI thread only; each accessor borrows for the call.
#[derive(Debug, Clone)]
pub struct SharedSession(Rc<RefCell<SessionState>>);

impl SharedSession {
    /// The panel starts open, as the viewer does on first display.
    pub fn new(document_id: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(SessionState {
            document_id: document_id.into(),
            page_count: None,
            current_page: 1,
            panel_open: true,
            capture_mode: false,
            captured_image: None,
        })))
    }

    pub fn document_id(&self) -> String {
        self.0.borrow().document_id.clone()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.0.borrow().page_count
    }

    pub fn set_page_count(&self, count: u32) {
        self.0.borrow_mut().page_count = Some(count);
    }

    pub fn current_page(&self) -> u32 {
        self.0.borrow().current_page
    }

    pub fn set_current_page(&self, page: u32) {
        self.0.borrow_mut().current_page = page;
    }

    pub fn panel_open(&self) -> bool {
        self.0.borrow().panel_open
    }

    /// Opening the panel cancels an armed capture.
    pub fn set_panel_open(&self, open: bool) {
        let mut state = self.0.borrow_mut();
        state.panel_open = open;
        if open && state.capture_mode {
            log::debug!("Panel opened, leaving capture mode");
            state.capture_mode = false;
        }
    }

    pub fn toggle_panel(&self) {
        let open = !self.panel_open();
        self.set_panel_open(open);
    }

    pub fn capture_mode(&self) -> bool {
        self.0.borrow().capture_mode
    }

    /// Arming closes the panel in the same transition.
    pub fn arm_capture(&self) {
        let mut state = self.0.borrow_mut();
        state.capture_mode = true;
        state.panel_open = false;
    }

    pub fn disarm_capture(&self) {
        self.0.borrow_mut().capture_mode = false;
    }

    pub fn has_captured_image(&self) -> bool {
        self.0.borrow().captured_image.is_some()
    }

    pub fn captured_image(&self) -> Option<CapturedImage> {
        self.0.borrow().captured_image.clone()
    }

    /// Last write wins: a pending, unconsumed image is discarded.
    pub fn set_captured_image(&self, image: CapturedImage) {
        let mut state = self.0.borrow_mut();
        if let Some(previous) = state.captured_image.replace(image) {
            log::debug!("Discarding unconsumed capture #{}", previous.serial);
        }
    }

    /// Hand the pending image to the consumer, leaving none behind.
    pub fn take_captured_image(&self) -> Option<CapturedImage> {
        self.0.borrow_mut().captured_image.take()
    }

    pub fn clear_captured_image(&self) {
        self.0.borrow_mut().captured_image = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(serial: u64) -> CapturedImage {
        CapturedImage {
            serial,
            png: vec![serial as u8],
            width: 20,
            height: 20,
        }
    }

    #[test]
    fn test_arming_closes_panel() {
        let session = SharedSession::new("doc");
        session.set_panel_open(true);
        session.arm_capture();
        assert!(!session.panel_open());
        assert!(session.capture_mode());
    }

    #[test]
    fn test_opening_panel_disarms_capture() {
        let session = SharedSession::new("doc");
        session.arm_capture();
        session.toggle_panel();
        assert!(session.panel_open());
        assert!(!session.capture_mode());
    }

    #[test]
    fn test_last_capture_wins() {
        let session = SharedSession::new("doc");
        session.set_captured_image(image(1));
        session.set_captured_image(image(2));
        assert_eq!(session.take_captured_image().map(|i| i.serial), Some(2));
        assert!(session.take_captured_image().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let viewer = SharedSession::new("doc");
        let panel = viewer.clone();
        viewer.set_current_page(7);
        viewer.set_captured_image(image(3));
        assert_eq!(panel.current_page(), 7);
        panel.clear_captured_image();
        assert!(!viewer.has_captured_image());
    }
}
