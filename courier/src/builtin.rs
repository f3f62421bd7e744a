//! Templates seeded at service startup.

use courier_template::{Template, TemplateError, TemplateRegistry};

/// Register the built-in templates. Deployments override them by
/// re-registering the same `(name, language)` pair.
pub fn register_builtins(registry: &TemplateRegistry) -> Result<(), TemplateError> {
    registry.register(
        Template::new(
            "verification_code",
            "en",
            "Your verification code",
            "Your verification code is {{code}}. It expires in {{ttl_minutes}} minutes.",
        )
        .with_html(
            "<p>Your verification code is <strong>{{code}}</strong>.</p>\
             <p>It expires in {{ttl_minutes}} minutes.</p>",
        ),
    )?;

    registry.register(
        Template::new(
            "welcome",
            "en",
            "Welcome, {{name}}!",
            "Hi {{name}},\n\nWelcome aboard. We're glad to have you.\n",
        )
        .with_html("<p>Hi {{name}},</p><p>Welcome aboard. We're glad to have you.</p>"),
    )?;

    Ok(())
}
