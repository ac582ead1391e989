//! Email template management with Handlebars
//!
//! Provides the `TemplateEngine` and the built-in templates for every
//! notification the service sends. Supports variables (`{{name}}`),
//! conditionals (`{{#if ...}}`), and loops (`{{#each ...}}`).

use eyre::{eyre, Result};
use handlebars::Handlebars;
use serde_json::Value;
use std::collections::HashMap;

/// Rendered template result
#[derive(Debug, Clone)]
pub struct RenderedTemplate {
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
}

/// Email template definition
#[derive(Clone, Debug)]
pub struct EmailTemplate {
    pub name: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
}

/// Handlebars-based template engine with the service's built-in templates.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
    templates: HashMap<String, EmailTemplate>,
}

impl TemplateEngine {
    /// Create a new TemplateEngine with the default templates registered.
    pub fn new() -> Result<Self> {
        let mut engine = Self {
            handlebars: Handlebars::new(),
            templates: HashMap::new(),
        };

        engine.register_defaults()?;

        Ok(engine)
    }

    /// Register a template.
    pub fn register(&mut self, template: EmailTemplate) -> Result<()> {
        self.handlebars
            .register_template_string(&format!("{}_subject", template.name), &template.subject)
            .map_err(|e| eyre!("Failed to register subject template: {}", e))?;

        if let Some(text) = &template.body_text {
            self.handlebars
                .register_template_string(&format!("{}_text", template.name), text)
                .map_err(|e| eyre!("Failed to register text template: {}", e))?;
        }

        if let Some(html) = &template.body_html {
            self.handlebars
                .register_template_string(&format!("{}_html", template.name), html)
                .map_err(|e| eyre!("Failed to register HTML template: {}", e))?;
        }

        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// Render a template by name.
    pub fn render(&self, name: &str, data: &Value) -> Result<RenderedTemplate> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| eyre!("Template not found: {}", name))?;

        let subject = self
            .handlebars
            .render(&format!("{}_subject", name), data)
            .map_err(|e| eyre!("Failed to render subject: {}", e))?;

        let body_text = if template.body_text.is_some() {
            Some(
                self.handlebars
                    .render(&format!("{}_text", name), data)
                    .map_err(|e| eyre!("Failed to render text: {}", e))?,
            )
        } else {
            None
        };

        let body_html = if template.body_html.is_some() {
            Some(
                self.handlebars
                    .render(&format!("{}_html", name), data)
                    .map_err(|e| eyre!("Failed to render HTML: {}", e))?,
            )
        } else {
            None
        };

        Ok(RenderedTemplate {
            subject,
            body_text,
            body_html,
        })
    }

    /// Check if a template exists.
    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// List all registered templates.
    pub fn list_templates(&self) -> Vec<&str> {
        self.templates.keys().map(|s| s.as_str()).collect()
    }

    fn register_defaults(&mut self) -> Result<()> {
        self.register(EmailTemplate {
            name: "signup_confirmation".to_string(),
            subject: "Confirmed: {{activity_name}} Registration".to_string(),
            body_text: Some(
                r#"{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}

You're signed up for {{activity_name}}!

Schedule: {{schedule}}

{{description}}

See you there,
Campus Activities"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #2563eb;">You're signed up!</h1>
    <p>{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}</p>
    <p>Your registration for <strong>{{activity_name}}</strong> is confirmed.</p>
    <p><strong>Schedule:</strong> {{schedule}}</p>
    <p>{{description}}</p>
    <p>See you there,<br>Campus Activities</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        self.register(EmailTemplate {
            name: "unregister_confirmation".to_string(),
            subject: "Unregistration Confirmed: {{activity_name}}".to_string(),
            body_text: Some(
                r#"{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}

You have been unregistered from {{activity_name}} ({{schedule}}).

If this was a mistake, you can sign up again from the activities portal.

Campus Activities"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #2563eb;">Unregistration confirmed</h1>
    <p>{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}</p>
    <p>You have been unregistered from <strong>{{activity_name}}</strong> ({{schedule}}).</p>
    <p>If this was a mistake, you can sign up again from the activities portal.</p>
    <p>Campus Activities</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        self.register(EmailTemplate {
            name: "activity_change".to_string(),
            subject: "Important Update: {{activity_name}}".to_string(),
            body_text: Some(
                r#"{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}

There's been a change to {{activity_name}}:

{{change_description}}
{{#if new_schedule}}
New schedule: {{new_schedule}}
{{/if}}
Campus Activities"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #d97706;">Activity update</h1>
    <p>{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}</p>
    <p>There's been a change to <strong>{{activity_name}}</strong>:</p>
    <p>{{change_description}}</p>
    {{#if new_schedule}}<p><strong>New schedule:</strong> {{new_schedule}}</p>{{/if}}
    <p>Campus Activities</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        self.register(EmailTemplate {
            name: "reminder".to_string(),
            subject: "Reminder: {{activity_name}} Coming Up!".to_string(),
            body_text: Some(
                r#"{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}

Just a reminder that {{activity_name}} is coming up.

Next session: {{next_session}}
Regular schedule: {{schedule}}

Campus Activities"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #2563eb;">Coming up: {{activity_name}}</h1>
    <p>{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}</p>
    <p><strong>Next session:</strong> {{next_session}}</p>
    <p><strong>Regular schedule:</strong> {{schedule}}</p>
    <p>Campus Activities</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        self.register(EmailTemplate {
            name: "new_activity".to_string(),
            subject: "New Activity Available: {{activity_name}}".to_string(),
            body_text: Some(
                r#"{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}

A new activity is open for registration: {{activity_name}}

Schedule: {{schedule}}
Spots available: {{max_participants}}

{{description}}

Sign up at {{portal_url}}

Campus Activities"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #16a34a;">New activity: {{activity_name}}</h1>
    <p>{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}</p>
    <p>{{description}}</p>
    <p><strong>Schedule:</strong> {{schedule}}<br>
       <strong>Spots available:</strong> {{max_participants}}</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{{portal_url}}"
           style="background-color: #16a34a; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; display: inline-block;">
            Sign Up
        </a>
    </p>
    <p>Campus Activities</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        self.register(EmailTemplate {
            name: "weekly_digest".to_string(),
            subject: "Weekly Activity Digest: {{week_start}} - {{week_end}}".to_string(),
            body_text: Some(
                r#"{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}

Your activities for {{week_start}} - {{week_end}}:
{{#each activities}}
- {{this.name}}: {{this.schedule}}
{{/each}}
Campus Activities"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #2563eb;">Your week at a glance</h1>
    <p>{{#if student_name}}Hello {{student_name}},{{else}}Hello,{{/if}}</p>
    <p>Activities for <strong>{{week_start}} - {{week_end}}</strong>:</p>
    <ul>
    {{#each activities}}
        <li><strong>{{this.name}}</strong>: {{this.schedule}}</li>
    {{/each}}
    </ul>
    <p>Campus Activities</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        self.register(EmailTemplate {
            name: "attendance_notification".to_string(),
            subject: "Attendance Notification: {{student_name}} - {{activity_name}}".to_string(),
            body_text: Some(
                r#"{{#if recipient_name}}Hello {{recipient_name}},{{else}}Hello,{{/if}}

Attendance record for {{student_name}} in {{activity_name}} on {{date}}: {{attendance_status}}
{{#if note}}
Note: {{note}}
{{/if}}
Campus Activities"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #2563eb;">Attendance notification</h1>
    <p>{{#if recipient_name}}Hello {{recipient_name}},{{else}}Hello,{{/if}}</p>
    <p><strong>{{student_name}}</strong> was marked <strong>{{attendance_status}}</strong>
       for {{activity_name}} on {{date}}.</p>
    {{#if note}}<p>Note: {{note}}</p>{{/if}}
    <p>Campus Activities</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        Ok(())
    }
}
