use std::borrow::Cow;

/// A buffered response produced by one pass through a request chain.
///
/// Headers can only change before the status is committed. The status is
/// committed either explicitly or by the first body write, after which further
/// status writes are rejected.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    committed: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            committed: false,
        }
    }
}

impl Response {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn into_parts(self) -> (u16, Vec<(String, String)>, Vec<u8>) {
        (self.status, self.headers, self.body)
    }

    /// Status codes a response may carry: three digits, `100` to `999`.
    pub fn is_valid_status(code: u16) -> bool {
        (100..=999).contains(&code)
    }

    /// Header names are non-empty RFC 7230 tokens.
    pub fn is_valid_header_name(name: &str) -> bool {
        !name.is_empty()
            && name.bytes().all(|b| {
                b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
            })
    }

    /// Header values may hold tabs and any byte except other controls and DEL.
    pub fn is_valid_header_value(value: &str) -> bool {
        value
            .bytes()
            .all(|b| b == b'\t' || (b >= 0x20 && b != 0x7f))
    }

    /// Sets or replaces a header. Returns `false` once the status is committed or
    /// when the name or value cannot be sent.
    pub(crate) fn set_header(&mut self, name: &str, value: &str) -> bool {
        if self.committed
            || !Self::is_valid_header_name(name)
            || !Self::is_valid_header_value(value)
        {
            return false;
        }
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        true
    }

    /// Commits the status. Returns `false` if a status was already committed or
    /// `code` is not a valid status.
    pub(crate) fn write_status(&mut self, code: u16) -> bool {
        if self.committed || !Self::is_valid_status(code) {
            return false;
        }
        self.status = code;
        self.committed = true;
        true
    }

    pub(crate) fn write(&mut self, data: &[u8]) {
        self.committed = true;
        self.body.extend_from_slice(data);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
