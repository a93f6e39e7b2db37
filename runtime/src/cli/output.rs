//! Output mode flags and small formatting helpers shared by commands.
//!
//! Global flags are set once in `main` as environment variables so every
//! command can check them without threading a context through.

pub const JSON_ENV: &str = "CARDHARVEST_JSON";
pub const QUIET_ENV: &str = "CARDHARVEST_QUIET";
pub const NO_COLOR_ENV: &str = "NO_COLOR";

pub fn is_json() -> bool {
    std::env::var_os(JSON_ENV).is_some()
}

pub fn is_quiet() -> bool {
    std::env::var_os(QUIET_ENV).is_some()
}

/// Neither `--json` nor `--quiet`.
pub fn is_chatty() -> bool {
    !is_json() && !is_quiet()
}

/// Pretty-print a JSON value on stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}

/// Status symbols, colored unless `NO_COLOR` is set.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self {
            color: std::env::var_os(NO_COLOR_ENV).is_none(),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("32", "[OK]")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("33", "[!!]")
    }

    pub fn info_sym(&self) -> String {
        self.paint("90", "[..]")
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("90", text)
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
