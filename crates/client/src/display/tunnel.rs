use super::{Badge, Tone};

pub fn tunnel_type_display(kind: i64) -> Badge {
    match kind {
        1 => Badge::new("端口转发", Tone::Primary),
        2 => Badge::new("隧道转发", Tone::Secondary),
        _ => Badge::new("未知", Tone::Default),
    }
}

/// How traffic is billed: one direction or both.
pub fn tunnel_flow_display(flow: i64) -> &'static str {
    match flow {
        1 => "单向计算",
        2 => "双向计算",
        _ => "未知",
    }
}
