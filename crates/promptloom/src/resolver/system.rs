//! Values provided by the environment for `system` slots.

use crate::clock::Clock;
use crate::value::SlotValue;

/// Look up a built-in system value by slot id.
///
/// Ids match case-insensitively with `_` and `-` ignored, so
/// `current_date`, `currentDate` and `CURRENT-DATE` are the same slot.
pub fn system_value(id: &str, clock: &dyn Clock) -> Option<SlotValue> {
    let key: String = id
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    let now = clock.now();

    let value = match key.as_str() {
        "currenttime" | "time" => SlotValue::Text(now.format("%H:%M:%S").to_string()),
        "currentdate" | "date" | "today" => SlotValue::Text(now.format("%Y-%m-%d").to_string()),
        "currentdatetime" | "datetime" | "now" => SlotValue::Text(now.to_rfc3339()),
        "timestamp" => SlotValue::Number(now.timestamp_millis() as f64),
        "randomid" | "uuid" => SlotValue::Text(uuid::Uuid::new_v4().to_string()),
        "locale" => SlotValue::Text(locale()),
        "platform" => SlotValue::Text(std::env::consts::OS.to_string()),
        _ => return None,
    };
    Some(value)
}

/// `LANG`-style locale (`en_US.UTF-8` → `en-US`), `en-US` when unset.
fn locale() -> String {
    std::env::var("LC_ALL")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var("LANG").ok())
        .and_then(|raw| {
            let tag: String = raw
                .split('.')
                .next()
                .unwrap_or_default()
                .replace('_', "-");
            (!tag.is_empty() && tag != "C" && tag != "POSIX").then_some(tag)
        })
        .unwrap_or_else(|| "en-US".to_string())
}
