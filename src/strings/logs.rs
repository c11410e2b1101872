//! # Log Banners
//!
//! Start and stop banners written around a run.

const RULE: &str = "--------------------------------------------------";

pub fn started_banner(name: &str, started_on: &str) -> String {
    format!("\n{RULE}\n      Running: {name}\n      started on: {started_on}\n{RULE}\n")
}

pub fn stopped_banner(name: &str, uptime: &str) -> String {
    format!("\n{RULE}\n      Running: {name}\n      stopped after: {uptime}\n{RULE}\n")
}
