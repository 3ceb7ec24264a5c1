//! Typed email bodies.

use url::form_urlencoded;

/// Props for the verify-email message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyEmailProps {
    pub site_url: String,
    pub token: String,
}

impl VerifyEmailProps {
    /// The code as shown to the user, e.g. `123 456`.
    pub fn display_code(&self) -> String {
        if self.token.len() == 6 && self.token.is_ascii() {
            let (head, tail) = self.token.split_at(3);
            format!("{head} {tail}")
        } else {
            self.token.clone()
        }
    }
}

/// Props for the password-reset message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetPasswordProps {
    pub site_url: String,
    pub reset_url: String,
}

impl ResetPasswordProps {
    /// Build the props, deriving the reset link from the site url and token.
    pub fn new(site_url: &str, token: &str) -> Self {
        let encoded: String = form_urlencoded::byte_serialize(token.as_bytes()).collect();
        let site_url = site_url.trim_end_matches('/');
        Self {
            site_url: site_url.to_string(),
            reset_url: format!("{site_url}/reset-password?token={encoded}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailMessage {
    VerifyEmail(VerifyEmailProps),
    ResetPassword(ResetPasswordProps),
}

impl EmailMessage {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailMessage::VerifyEmail(_) => "Verify Email",
            EmailMessage::ResetPassword(_) => "Password Reset",
        }
    }

    pub fn html_body(&self) -> String {
        match self {
            EmailMessage::VerifyEmail(props) => layout(
                &props.site_url,
                "Verify your email address",
                &format!(
                    "<p>Enter the code below into the browser window where you began \
                     creating your Dashboard account.</p>\n\
                     <p style=\"font-size: 28px; letter-spacing: 4px;\"><strong>{code}</strong></p>",
                    code = props.display_code()
                ),
                "This email address was used to create an account with the Dashboard. \
                 If it was not you, you can safely ignore this email.",
            ),
            EmailMessage::ResetPassword(props) => layout(
                &props.site_url,
                "Reset Your Password",
                &format!(
                    "<p>Click the button below to reset your password. If you didn't \
                     request this, you can safely ignore this email.</p>\n\
                     <p><a href=\"{url}\" style=\"display: inline-block; padding: 12px 24px; \
                     background-color: #1c58d9; color: #ffffff; text-decoration: none; \
                     border-radius: 4px;\">Reset Password</a></p>\n\
                     <p style=\"font-size: 12px; color: #666;\">Or paste this link into your \
                     browser:<br>{url}</p>",
                    url = props.reset_url
                ),
                "This link expires in 24 hours.",
            ),
        }
    }
}

fn layout(site_url: &str, title: &str, content: &str, footer: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2>{title}</h2>
        {content}
        <p style="color: #666; font-size: 12px; margin-top: 40px;">{footer}</p>
        <p style="color: #999; font-size: 12px;"><a href="{site_url}">{site_url}</a></p>
    </div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_code_is_split_for_display() {
        let props = VerifyEmailProps {
            site_url: "https://dash.example.com".into(),
            token: "123456".into(),
        };
        assert_eq!(props.display_code(), "123 456");

        let body = EmailMessage::VerifyEmail(props).html_body();
        assert!(body.contains("123 456"));
        assert!(body.contains("https://dash.example.com"));
    }

    #[test]
    fn reset_url_is_escaped_and_anchored_to_site() {
        let props = ResetPasswordProps::new("https://dash.example.com/", "ab+c/d");
        assert_eq!(
            props.reset_url,
            "https://dash.example.com/reset-password?token=ab%2Bc%2Fd"
        );
        let message = EmailMessage::ResetPassword(props);
        assert_eq!(message.subject(), "Password Reset");
        assert!(message.html_body().contains("reset-password?token=ab%2Bc%2Fd"));
    }
}
