//! HID transport abstraction.

use hidapi::{HidDevice, HidResult};

/// HID connection used by an RGB controller.
pub trait HidTransport {
    /// Write an output report, the first byte being the report ID.
    fn write(&self, data: &[u8]) -> HidResult<usize>;

    /// Read the USB serial number.
    fn serial_number(&self) -> HidResult<Option<String>>;
}

impl HidTransport for HidDevice {
    fn write(&self, data: &[u8]) -> HidResult<usize> {
        HidDevice::write(self, data)
    }

    fn serial_number(&self) -> HidResult<Option<String>> {
        self.get_serial_number_string()
    }
}

/// Report recorder for driver tests.
#[cfg(test)]
pub mod mock {
    use std::cell::RefCell;
    use std::rc::Rc;

    use hidapi::{HidError, HidResult};

    use super::HidTransport;

    #[derive(Default)]
    pub struct MockTransport {
        /// Written reports, shared so they stay readable after the driver took ownership.
        pub reports: Rc<RefCell<Vec<Vec<u8>>>>,
        pub serial: Option<String>,
        pub fail_serial: bool,
    }

    impl HidTransport for MockTransport {
        fn write(&self, data: &[u8]) -> HidResult<usize> {
            self.reports.borrow_mut().push(data.to_vec());
            Ok(data.len())
        }

        fn serial_number(&self) -> HidResult<Option<String>> {
            if self.fail_serial {
                return Err(HidError::HidApiError { message: "serial unavailable".into() });
            }

            Ok(self.serial.clone())
        }
    }
}
