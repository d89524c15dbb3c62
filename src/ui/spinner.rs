const SPINNER_CHARS: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

#[derive(Debug)]
pub struct Spinner {
    current_frame: usize,
    is_spinning: bool,
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spinner {
    pub fn new() -> Self {
        Spinner {
            current_frame: 0,
            is_spinning: false,
        }
    }

    pub fn start(&mut self) {
        self.is_spinning = true;
    }

    pub fn stop(&mut self) {
        self.is_spinning = false;
    }

    pub fn is_spinning(&self) -> bool {
        self.is_spinning
    }

    pub fn tick(&mut self) {
        if self.is_spinning {
            self.current_frame = (self.current_frame + 1) % SPINNER_CHARS.len();
        }
    }

    pub fn get_frame(&self) -> char {
        SPINNER_CHARS[self.current_frame]
    }
}

pub fn spinner_frame(spinner: &Spinner) -> String {
    format!("Sentinel-X is decrypting {}", spinner.get_frame())
}
