use crate::core::context::PostcodeContext;
use crate::domain::model::ResultRecord;
use crate::utils::logger::report_error;
use crate::utils::validation::{canonicalize_postcode, is_valid_postcode};
use chrono::Local;
use std::fmt::Write;

pub const INVALID_POSTCODE_MESSAGE: &str = "Please enter a valid UK postcode";
pub const CHECK_FAILED_MESSAGE: &str =
    "There was an error checking your postcode. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Input failed validation; nothing was fetched.
    Rejected,
    /// A check is already outstanding.
    Busy,
    Checked(ResultRecord),
    Failed,
}

/// The "check your postcode" form: validate, fetch, render.
#[derive(Debug, Clone)]
pub struct CheckerForm {
    input: String,
    error: Option<String>,
}

impl CheckerForm {
    pub fn new(ctx: &PostcodeContext) -> Self {
        Self {
            input: ctx.postcode().to_string(),
            error: None,
        }
    }

    pub fn set_input(&mut self, raw: impl Into<String>) {
        self.input = raw.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn submit(&mut self, ctx: &PostcodeContext) -> SubmitOutcome {
        if ctx.is_loading() {
            return SubmitOutcome::Busy;
        }

        let formatted = canonicalize_postcode(&self.input);
        if !is_valid_postcode(&formatted) {
            self.error = Some(INVALID_POSTCODE_MESSAGE.to_string());
            return SubmitOutcome::Rejected;
        }
        self.error = None;

        let postcode = match ctx.set_postcode(&formatted) {
            Ok(postcode) => postcode,
            Err(e) => {
                report_error("Error checking postcode", &e);
                self.error = Some(INVALID_POSTCODE_MESSAGE.to_string());
                return SubmitOutcome::Rejected;
            }
        };

        match ctx.check_results(Some(&postcode)).await {
            Ok(record) => SubmitOutcome::Checked(record),
            Err(_) => {
                self.error = Some(CHECK_FAILED_MESSAGE.to_string());
                SubmitOutcome::Failed
            }
        }
    }

    pub fn render(&self, ctx: &PostcodeContext) -> String {
        let mut out = String::from("Check Your Postcode\n");
        let _ = writeln!(out, "Enter Postcode: {}", self.input);
        if let Some(error) = &self.error {
            let _ = writeln!(out, "  ! {}", error);
        }
        out.push_str(if ctx.is_loading() {
            "[ Checking... ]\n"
        } else {
            "[ Check Results ]\n"
        });

        if let Some(record) = ctx.results() {
            out.push('\n');
            out.push_str(&render_result(&record));
        }
        out
    }
}

pub fn render_result(record: &ResultRecord) -> String {
    let status = if record.won {
        "Winner!"
    } else {
        "No win this time"
    };
    let last_checked = record
        .last_checked
        .with_timezone(&Local)
        .format("%d/%m/%Y, %H:%M:%S");

    let mut out = String::new();
    let _ = writeln!(out, "Results for {}", record.postcode);
    let _ = writeln!(out, "  Status: {}", status);
    let _ = writeln!(out, "  Last checked: {}", last_checked);
    if !record.message.is_empty() {
        let _ = writeln!(out, "  {}", record.message);
    }
    out
}
