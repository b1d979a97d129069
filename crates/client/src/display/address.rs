//! Entry and target address rendering for forwards.
//!
//! Addresses are stored as comma separated lists. The list views show the
//! first entry plus a count; clicking either copies a single address or opens
//! a picker with all of them.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressItem {
    pub id: usize,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressAction {
    None,
    Copy { text: String, label: String },
    Modal { title: String, items: Vec<AddressItem> },
}

fn split_entries(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

/// `host:1234` or `[v6]:1234`. A bare IPv6 literal has no port.
fn ends_with_port(entry: &str) -> bool {
    let port = if entry.starts_with('[') {
        entry.rsplit_once("]:").map(|(_, port)| port)
    } else if entry.matches(':').count() == 1 {
        entry.rsplit_once(':').map(|(_, port)| port)
    } else {
        None
    };
    port.is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

fn with_port(ip: &str, port: u16) -> String {
    if ip.contains(':') && !ip.starts_with('[') {
        format!("[{ip}]:{port}")
    } else {
        format!("{ip}:{port}")
    }
}

/// First entry address joined with `port`, plus how many more there are.
///
/// Entries that already carry a port are shown as is. Without one, a zero
/// port renders nothing.
pub fn format_in_address(ips: &str, port: u16) -> String {
    let items = split_entries(ips);
    let Some(first) = items.first() else {
        return String::new();
    };

    let shown = if ends_with_port(first) {
        first.to_string()
    } else if port == 0 {
        return String::new();
    } else {
        with_port(first, port)
    };

    match items.len() {
        1 => shown,
        n => format!("{shown} (+{}个)", n - 1),
    }
}

pub fn format_remote_address(addresses: &str) -> String {
    let items = split_entries(addresses);
    match items.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (+{})", rest.len()),
    }
}

pub fn has_multiple_addresses(addresses: &str) -> bool {
    split_entries(addresses).len() > 1
}

/// What clicking an address cell does.
///
/// `port` is given for entry addresses and `None` for targets.
pub fn resolve_address_action(addresses: &str, port: Option<u16>, title: &str) -> AddressAction {
    if addresses.is_empty() {
        return AddressAction::None;
    }

    let items = split_entries(addresses);
    let listed: Vec<String> = match port {
        Some(port) => {
            if items.len() <= 1 {
                return AddressAction::Copy {
                    text: format_in_address(addresses, port),
                    label: title.to_string(),
                };
            }
            if ends_with_port(items[0]) {
                items.iter().map(|s| s.to_string()).collect()
            } else {
                items.iter().map(|ip| with_port(ip, port)).collect()
            }
        }
        None => {
            if items.len() <= 1 {
                return AddressAction::Copy {
                    text: addresses.to_string(),
                    label: title.to_string(),
                };
            }
            items.iter().map(|s| s.to_string()).collect()
        }
    };

    AddressAction::Modal {
        title: format!("{title} ({}个)", listed.len()),
        items: listed
            .into_iter()
            .enumerate()
            .map(|(id, address)| AddressItem { id, address })
            .collect(),
    }
}
