//! Line re-assembly for the newline-delimited serial discipline.

/// Accumulates raw bytes read from the line and hands out complete,
/// terminator-stripped lines. Data after a terminator is kept for the
/// next call.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    data: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> LineBuffer {
        LineBuffer {
            data: Vec::with_capacity(256),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Take the next complete line out of the buffer, with the `\n`
    /// terminator (and a preceding `\r`, if any) stripped.
    pub fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.data.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.data.drain(..=pos).collect();
        line.pop(); // the \n
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    /// Drop any partial data, e.g. when a fresh exchange starts.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
