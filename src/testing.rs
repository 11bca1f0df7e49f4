//! In-memory link used by the unit tests.

use crate::answers::{ROTARY_TABLE_ANS_TYPE_CONVERTER_STATUS, ROTARY_TABLE_ANS_TYPE_MOTOR_STATUS};
use crate::base::SerialLink;
use crate::checksum::crc8;
use crate::protocol::REQUEST_LENGTH;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>>>;

struct MockState {
    pending: Vec<u8>,
    frames: Vec<Vec<u8>>,
    input: VecDeque<u8>,
    chunk_size: usize,
    clears: usize,
    releases: usize,
    responder: Responder,
}

/// Scripted link: every complete request frame written is recorded and handed to the
/// responder, whose answer (if any) becomes readable input.
#[derive(Clone)]
pub struct MockLink {
    state: Rc<RefCell<MockState>>,
}

impl MockLink {
    pub fn new<F>(responder: F) -> MockLink
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + 'static,
    {
        let _ = env_logger::builder().is_test(true).try_init();
        MockLink {
            state: Rc::new(RefCell::new(MockState {
                pending: Vec::new(),
                frames: Vec::new(),
                input: VecDeque::new(),
                chunk_size: usize::MAX,
                clears: 0,
                releases: 0,
                responder: Box::new(responder),
            })),
        }
    }

    /// Makes bytes readable as if they arrived before the next request.
    pub fn push_input(&self, data: &[u8]) {
        self.state.borrow_mut().input.extend(data);
    }

    /// Limits how many bytes a single read returns.
    pub fn set_chunk_size(&self, chunk_size: usize) {
        self.state.borrow_mut().chunk_size = chunk_size;
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.borrow().frames.clone()
    }

    /// Command codes of the recorded frames, in order.
    pub fn commands(&self) -> Vec<u8> {
        self.state
            .borrow()
            .frames
            .iter()
            .map(|frame| frame[1] & 0xF)
            .collect()
    }

    pub fn clears(&self) -> usize {
        self.state.borrow().clears
    }

    pub fn releases(&self) -> usize {
        self.state.borrow().releases
    }
}

impl io::Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if state.input.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(state.input.len()).min(state.chunk_size);
        for (slot, byte) in buf.iter_mut().zip(state.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl io::Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.pending.extend_from_slice(buf);
        while state.pending.len() >= REQUEST_LENGTH {
            let frame: Vec<u8> = state.pending.drain(..REQUEST_LENGTH).collect();
            state.frames.push(frame.clone());
            if let Some(response) = (state.responder)(&frame) {
                state.input.extend(response);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for MockLink {
    fn clear_input(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.input.clear();
        state.clears += 1;
        Ok(())
    }

    fn release_direction(&mut self) -> io::Result<()> {
        self.state.borrow_mut().releases += 1;
        Ok(())
    }
}

fn seal(mut frame: Vec<u8>) -> Vec<u8> {
    let crc = crc8(&frame);
    frame.push(crc);
    frame
}

/// A valid motor status frame reporting `status` at the raw angle word `angle`.
pub fn motor_status_frame(address: u8, status: u8, angle: u16) -> Vec<u8> {
    let [hi, lo] = angle.to_be_bytes();
    seal(vec![
        0x5D,
        (address << 4) | ROTARY_TABLE_ANS_TYPE_MOTOR_STATUS,
        status,
        hi,
        lo,
        hi,
        lo,
        0,
    ])
}

/// A valid converter status frame.
pub fn converter_status_frame(status: u8, voltage: u8) -> Vec<u8> {
    seal(vec![
        0x5D,
        (0xE << 4) | ROTARY_TABLE_ANS_TYPE_CONVERTER_STATUS,
        status,
        voltage,
        0,
        0,
        0,
        0,
    ])
}
