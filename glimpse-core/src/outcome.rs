use crate::runner::CommandOutput;

pub const NOT_RECOGNIZED: &str = "Face not recognized or face has not been registered";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Recognized { username: String },
    Rejected { message: String },
}

impl LoginOutcome {
    pub fn is_recognized(&self) -> bool {
        matches!(self, LoginOutcome::Recognized { .. })
    }
}

/// Interpret the recognizer's login output. A clean exit with text means
/// the text is the recognized username.
pub fn classify_login(result: &CommandOutput) -> LoginOutcome {
    let text = result.output.trim();

    if result.exit_code != 0 {
        let message = if text.is_empty() {
            format!("exited with code {}", result.exit_code)
        } else {
            result.output.clone()
        };
        return LoginOutcome::Rejected { message };
    }

    if text.is_empty() {
        return LoginOutcome::Rejected {
            message: NOT_RECOGNIZED.to_string(),
        };
    }

    LoginOutcome::Recognized {
        username: text.to_string(),
    }
}

/// Status line for the recognizer's enrollment output.
pub fn enrollment_status(result: &CommandOutput) -> String {
    let text = result.output.trim();
    match (result.exit_code, text.is_empty()) {
        (0, true) => "Recognizer finished successfully".to_string(),
        (0, false) => text.to_string(),
        (code, _) => format!("Recognizer exited ({}): {}", code, text),
    }
}
