#![no_main]

use libfuzzer_sys::fuzz_target;
use mime_info::{MagicRule, MagicRuleType};

fuzz_target!(|data: &[u8]| {
    // Split the input into a rule value and a match buffer
    let split = data.len() / 2;
    let (value, buffer) = data.split_at(split);

    if let Ok(value) = std::str::from_utf8(value) {
        for rule_type in [
            MagicRuleType::String,
            MagicRuleType::Byte,
            MagicRuleType::Big16,
            MagicRuleType::Big32,
            MagicRuleType::Little16,
            MagicRuleType::Little32,
            MagicRuleType::Host16,
            MagicRuleType::Host32,
        ] {
            let rule = MagicRule::new(rule_type, value, 0, buffer.len() + 16);
            let _ = rule.matches(buffer);
        }
    }
});
