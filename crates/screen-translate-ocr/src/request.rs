use screen_translate_types::{Frame, LanguageHint};

/// Detection invocation metadata.
#[derive(Debug, Clone, Copy)]
pub struct DetectRequest<'a> {
    frame: &'a Frame,
    language: LanguageHint,
}

impl<'a> DetectRequest<'a> {
    pub fn new(frame: &'a Frame, language: LanguageHint) -> Self {
        Self { frame, language }
    }

    pub fn frame(&self) -> &'a Frame {
        self.frame
    }

    pub fn language(&self) -> LanguageHint {
        self.language
    }
}
