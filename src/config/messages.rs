/// User-facing message templates. The embedding host typically loads
/// overrides from its own message files; these defaults mirror the stock set.
#[derive(Clone, Debug)]
pub struct Messages {
    pub usage_report: String,
    pub daily_limit_reached: String,
    pub cooldown_active: String,
    pub no_permission: String,
    pub no_target: String,
    pub submit_success: String,
    pub staff_notification: String,
    pub custom_reason_prompt: String,
    pub custom_category_label: String,
    pub duration_prompt: String,
    pub duration_invalid: String,
    pub approve_reason_prompt: String,
    pub reject_reason_prompt: String,
    pub approve_success: String,
    pub reject_success: String,
    pub already_resolved: String,
    pub not_found: String,
    pub generic_failure: String,
    pub save_failure: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            usage_report: "Usage: /report <player>".to_string(),
            daily_limit_reached: "You cannot file any more reports today.".to_string(),
            cooldown_active: "Slow down, you are reporting too quickly.".to_string(),
            no_permission: "You do not have permission to do that.".to_string(),
            no_target: "No report target found.".to_string(),
            submit_success: "Your report has been filed.".to_string(),
            staff_notification: "New report: {subject} reported by {reporter}".to_string(),
            custom_reason_prompt: "Type the report reason in chat (it will not be broadcast)."
                .to_string(),
            custom_category_label: "Other (type in chat)".to_string(),
            duration_prompt: "Enter a penalty duration (e.g. 10m, 2h, 1d or 'permanent'):"
                .to_string(),
            duration_invalid:
                "Invalid duration. Examples: 10m, 2h, 1d or 'permanent'. Try again.".to_string(),
            approve_reason_prompt: "Type a short approval reason:".to_string(),
            reject_reason_prompt: "Type the rejection reason:".to_string(),
            approve_success: "Report approved and the penalty was applied.".to_string(),
            reject_success: "Report rejected and recorded.".to_string(),
            already_resolved: "That report has already been resolved.".to_string(),
            not_found: "Report not found.".to_string(),
            generic_failure: "Something went wrong, please try again.".to_string(),
            save_failure: "Your report could not be saved.".to_string(),
        }
    }
}

/// Substitute `{key}` placeholders in a template.
pub fn render(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in pairs {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}
