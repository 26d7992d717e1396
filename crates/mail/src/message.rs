use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    PlainText,
    Html,
}

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Html => "text/html",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Content {
    pub content_type: ContentType,
    pub value: String,
}

impl Content {
    pub fn plain(value: impl Into<String>) -> Self {
        Self { content_type: ContentType::PlainText, value: value.into() }
    }

    pub fn html(value: impl Into<String>) -> Self {
        Self { content_type: ContentType::Html, value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub content: Content,
}

impl Mail {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        content: Content,
    ) -> Self {
        Self { from: from.into(), to: to.into(), subject: subject.into(), content }
    }

    /// SendGrid v3 `mail/send` request body.
    pub fn to_request_body(&self) -> RequestBody<'_> {
        RequestBody {
            personalizations: vec![Personalization { to: vec![Address { email: &self.to }] }],
            from: Address { email: &self.from },
            subject: &self.subject,
            content: vec![BodyPart {
                kind: self.content.content_type.mime(),
                value: &self.content.value,
            }],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RequestBody<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<BodyPart<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct BodyPart<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}
