//! Color styling for docflow CLI output.
//!
//! Only states that need someone's attention get color: documents waiting on
//! approvers, rejections, and final approvals. Drafts use standard text.

use docflow_core::document::Document;
use docflow_core::enums::{ApprovalStatus, DocumentStatus, StepType};
use owo_colors::OwoColorize;

use crate::terminal::supports_color;

// ---------------------------------------------------------------------------
// Palette (RGB)
// ---------------------------------------------------------------------------

const PASS: (u8, u8, u8) = (0xc2, 0xd9, 0x4c); // #c2d94c green
const WARN: (u8, u8, u8) = (0xff, 0xb4, 0x54); // #ffb454 yellow
const FAIL: (u8, u8, u8) = (0xf0, 0x71, 0x78); // #f07178 red
const MUTED: (u8, u8, u8) = (0x6c, 0x76, 0x80); // #6c7680 gray
const ACCENT: (u8, u8, u8) = (0x59, 0xc2, 0xff); // #59c2ff blue
const CHECKING: (u8, u8, u8) = (0xd2, 0xa6, 0xff); // #d2a6ff purple

// ---------------------------------------------------------------------------
// Icons
// ---------------------------------------------------------------------------

pub const STATUS_ICON_DRAFT: &str = "\u{25CB}"; // hollow circle
pub const STATUS_ICON_IN_FLIGHT: &str = "\u{25D0}"; // half circle
pub const STATUS_ICON_APPROVED: &str = "\u{2713}"; // check
pub const STATUS_ICON_REJECTED: &str = "\u{2716}"; // heavy x

pub const ICON_PASS: &str = "\u{2713}";
pub const ICON_WARN: &str = "\u{26A0}";
pub const ICON_FAIL: &str = "\u{2716}";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn color_str(s: &str, rgb: (u8, u8, u8)) -> String {
    if supports_color() {
        s.truecolor(rgb.0, rgb.1, rgb.2).to_string()
    } else {
        s.to_string()
    }
}

fn color_bold_str(s: &str, rgb: (u8, u8, u8)) -> String {
    if supports_color() {
        s.truecolor(rgb.0, rgb.1, rgb.2).bold().to_string()
    } else {
        s.to_string()
    }
}

pub fn render_pass(s: &str) -> String {
    color_str(s, PASS)
}

pub fn render_warn(s: &str) -> String {
    color_str(s, WARN)
}

pub fn render_fail(s: &str) -> String {
    color_str(s, FAIL)
}

pub fn render_muted(s: &str) -> String {
    color_str(s, MUTED)
}

pub fn render_accent(s: &str) -> String {
    color_str(s, ACCENT)
}

pub fn render_bold(s: &str) -> String {
    if supports_color() {
        s.bold().to_string()
    } else {
        s.to_string()
    }
}

/// Uppercased, bold section heading.
pub fn render_category(s: &str) -> String {
    color_bold_str(&s.to_uppercase(), ACCENT)
}

pub fn render_pass_icon() -> String {
    color_str(ICON_PASS, PASS)
}

pub fn render_warn_icon() -> String {
    color_str(ICON_WARN, WARN)
}

pub fn render_fail_icon() -> String {
    color_str(ICON_FAIL, FAIL)
}

// ---------------------------------------------------------------------------
// Domain rendering
// ---------------------------------------------------------------------------

pub fn status_icon(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Draft => STATUS_ICON_DRAFT,
        DocumentStatus::Approved => STATUS_ICON_APPROVED,
        DocumentStatus::Rejected => STATUS_ICON_REJECTED,
        _ => STATUS_ICON_IN_FLIGHT,
    }
}

pub fn render_status(status: DocumentStatus) -> String {
    let s = status.as_str();
    match status {
        DocumentStatus::Draft => s.to_string(),
        DocumentStatus::Prepare => color_str(s, ACCENT),
        DocumentStatus::PendingChecking | DocumentStatus::Checking => color_str(s, CHECKING),
        DocumentStatus::Pending => color_str(s, WARN),
        DocumentStatus::Approved => color_str(s, PASS),
        DocumentStatus::Rejected => color_bold_str(s, FAIL),
    }
}

pub fn render_approval_status(status: ApprovalStatus) -> String {
    let s = status.as_str();
    match status {
        ApprovalStatus::Pending => color_str(s, WARN),
        ApprovalStatus::Approved => color_str(s, PASS),
        ApprovalStatus::Rejected => color_str(s, FAIL),
    }
}

pub fn render_step_type(step_type: StepType) -> String {
    let label = step_type.label();
    match step_type {
        StepType::Prepare => label.to_string(),
        StepType::Checking => color_str(label, CHECKING),
        StepType::Approve => color_str(label, WARN),
    }
}

/// One-line summary: `ICON ID [status] step N - Title`.
///
/// Finished documents are dimmed as a whole.
pub fn render_document_compact(doc: &Document) -> String {
    let step = if doc.status.is_in_flight() {
        format!(" step {}", doc.current_step)
    } else {
        String::new()
    };
    if doc.status.is_terminal() {
        let line = format!(
            "{} {} [{}]{} - {}",
            status_icon(doc.status),
            doc.id,
            doc.status,
            step,
            doc.title
        );
        return match doc.status {
            DocumentStatus::Rejected => color_str(&line, FAIL),
            _ => render_muted(&line),
        };
    }
    format!(
        "{} {} [{}]{} - {}",
        status_icon(doc.status),
        doc.id,
        render_status(doc.status),
        step,
        doc.title
    )
}
