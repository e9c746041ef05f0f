//! Reply texts.
//!
//! Stored timestamps are UTC; they are shifted by the configured offset
//! (+8h by default) for display. A timestamp that does not parse is shown
//! as stored.

use chrono::{Duration, NaiveDateTime};
use vitalbot_core::channel::OutboundMessage;
use vitalbot_core::reading::{NewReading, Reading, TIMESTAMP_FORMAT};

use crate::classify::{Classification, display_label};

pub const ANALYSIS_TITLE: &str = "血压分析结果";
pub const HISTORY_TITLE: &str = "历史记录";
pub const NO_RECORDS: &str = "暂无记录。";
pub const DOWNLOAD_FAILED: &str = "抱歉，无法下载图片，请重试。";
pub const ANALYZING: &str = "已收到图片，正在分析...";

/// Shown for a measurement the model could not read.
const ABSENT: &str = "-";

/// Formats replies for one display time zone.
#[derive(Debug, Clone, Copy)]
pub struct ReplyFormatter {
    utc_offset: Duration,
}

impl Default for ReplyFormatter {
    fn default() -> Self {
        Self::new(8)
    }
}

impl ReplyFormatter {
    pub fn new(utc_offset_hours: i32) -> Self {
        Self {
            utc_offset: Duration::hours(i64::from(utc_offset_hours)),
        }
    }

    /// Result of analysing one photo, as a markdown message.
    pub fn format_analysis(&self, reading: &NewReading) -> OutboundMessage {
        let label = reading
            .label
            .as_deref()
            .map(display_label)
            .unwrap_or(Classification::Unknown.display());

        let body = format!(
            "**分析结果**\n\n\
             收缩压 (高压): {}\n\
             舒张压 (低压): {}\n\
             脉搏: {}\n\
             结果: **{label}**\n\n\
             已保存到您的历史记录。",
            value(reading.systolic),
            value(reading.diastolic),
            value(reading.pulse),
        );
        OutboundMessage::markdown(ANALYSIS_TITLE, body)
    }

    /// A page of history, newest first, as a markdown message.
    pub fn format_history(&self, readings: &[Reading]) -> OutboundMessage {
        if readings.is_empty() {
            return OutboundMessage::markdown(HISTORY_TITLE, NO_RECORDS);
        }

        let mut lines = vec!["### 最近记录".to_string()];
        for r in readings {
            let label = r
                .label
                .as_deref()
                .filter(|l| !l.is_empty())
                .map(|l| format!(" **{}**", display_label(l)))
                .unwrap_or_default();
            lines.push(format!(
                "- {}\n  - 高压: {} | 低压: {} | 脉搏: {}{label}",
                self.local_time(&r.created_at),
                value(r.systolic),
                value(r.diastolic),
                value(r.pulse),
            ));
        }
        OutboundMessage::markdown(HISTORY_TITLE, lines.join("\n"))
    }

    /// Shift a stored UTC timestamp into display time.
    pub fn local_time(&self, stored: &str) -> String {
        let parsed = NaiveDateTime::parse_from_str(stored.trim(), TIMESTAMP_FORMAT);
        match parsed.map(|utc| utc.checked_add_signed(self.utc_offset)) {
            Ok(Some(local)) => local.format(TIMESTAMP_FORMAT).to_string(),
            Ok(None) => {
                tracing::debug!(stored, "Timestamp out of range after offset, shown as stored");
                stored.to_string()
            }
            Err(e) => {
                tracing::debug!(stored, error = %e, "Unparseable timestamp shown as stored");
                stored.to_string()
            }
        }
    }
}

fn value(v: Option<i32>) -> String {
    v.map_or_else(|| ABSENT.to_string(), |n| n.to_string())
}

/// Reply to any text that is not the history command.
pub fn greeting(display_name: &str, history_keyword: &str) -> OutboundMessage {
    OutboundMessage::text(format!(
        "欢迎 {display_name}! 请发送血压计的照片给我，或者输入 '{history_keyword}' 查看您的记录。"
    ))
}

pub fn download_failed() -> OutboundMessage {
    OutboundMessage::text(DOWNLOAD_FAILED)
}

pub fn analyzing() -> OutboundMessage {
    OutboundMessage::text(ANALYZING)
}

pub fn extraction_failed(reason: &str) -> OutboundMessage {
    OutboundMessage::text(format!("分析失败: {reason}"))
}
