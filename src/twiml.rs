//! Call-control markup (TwiML) returned from every voice webhook.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

const FALLBACK_HANGUP: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Hangup/></Response>";

const STATUS_CALLBACK_EVENTS: &str = "initiated ringing answered completed";

#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    Say { text: String, voice: String },
    Pause { seconds: u32 },
    Dial(Dial),
    Redirect { url: String },
    Hangup,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DialTarget {
    Client {
        identity: String,
        status_callback: Option<String>,
    },
    Number {
        number: String,
        status_callback: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dial {
    pub timeout: Option<u32>,
    pub caller_id: Option<String>,
    pub action: Option<String>,
    pub record: bool,
    pub recording_status_callback: Option<String>,
    pub targets: Vec<DialTarget>,
}

impl Dial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    pub fn action(mut self, url: impl Into<String>) -> Self {
        self.action = Some(url.into());
        self
    }

    /// Records both legs from the moment the callee answers.
    pub fn record(mut self, recording_status_callback: impl Into<String>) -> Self {
        self.record = true;
        self.recording_status_callback = Some(recording_status_callback.into());
        self
    }

    pub fn client(mut self, identity: impl Into<String>, status_callback: Option<String>) -> Self {
        self.targets.push(DialTarget::Client {
            identity: identity.into(),
            status_callback,
        });
        self
    }

    pub fn number(mut self, number: impl Into<String>, status_callback: Option<String>) -> Self {
        self.targets.push(DialTarget::Number {
            number: number.into(),
            status_callback,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceResponse {
    voice: String,
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            verbs: Vec::new(),
        }
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        let voice = self.voice.clone();
        self.verbs.push(Verb::Say {
            text: text.into(),
            voice,
        });
        self
    }

    pub fn pause(mut self, seconds: u32) -> Self {
        self.verbs.push(Verb::Pause { seconds });
        self
    }

    pub fn dial(mut self, dial: Dial) -> Self {
        self.verbs.push(Verb::Dial(dial));
        self
    }

    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect { url: url.into() });
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Speaks `message` and ends the call.
    pub fn say_and_hangup(self, message: impl Into<String>) -> Self {
        self.say(message).hangup()
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn render(&self) -> Result<String, quick_xml::Error> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        if self.verbs.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new("Response")))?;
        } else {
            writer.write_event(Event::Start(BytesStart::new("Response")))?;
            for verb in &self.verbs {
                write_verb(&mut writer, verb)?;
            }
            writer.write_event(Event::End(BytesEnd::new("Response")))?;
        }

        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}

fn write_verb(writer: &mut Writer<Vec<u8>>, verb: &Verb) -> Result<(), quick_xml::Error> {
    match verb {
        Verb::Say { text, voice } => {
            let mut start = BytesStart::new("Say");
            start.push_attribute(("voice", voice.as_str()));
            write_text_element(writer, start, text)?;
        }
        Verb::Pause { seconds } => {
            let mut start = BytesStart::new("Pause");
            start.push_attribute(("length", seconds.to_string().as_str()));
            writer.write_event(Event::Empty(start))?;
        }
        Verb::Dial(dial) => write_dial(writer, dial)?,
        Verb::Redirect { url } => {
            let mut start = BytesStart::new("Redirect");
            start.push_attribute(("method", "POST"));
            write_text_element(writer, start, url)?;
        }
        Verb::Hangup => {
            writer.write_event(Event::Empty(BytesStart::new("Hangup")))?;
        }
    }
    Ok(())
}

fn write_dial(writer: &mut Writer<Vec<u8>>, dial: &Dial) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new("Dial");
    if let Some(timeout) = dial.timeout {
        start.push_attribute(("timeout", timeout.to_string().as_str()));
    }
    if let Some(caller_id) = &dial.caller_id {
        start.push_attribute(("callerId", caller_id.as_str()));
    }
    if let Some(action) = &dial.action {
        start.push_attribute(("action", action.as_str()));
        start.push_attribute(("method", "POST"));
    }
    if dial.record {
        start.push_attribute(("record", "record-from-answer-dual"));
    }
    if let Some(callback) = &dial.recording_status_callback {
        start.push_attribute(("recordingStatusCallback", callback.as_str()));
        start.push_attribute(("recordingStatusCallbackMethod", "POST"));
    }
    writer.write_event(Event::Start(start))?;

    for target in &dial.targets {
        let (name, value, status_callback) = match target {
            DialTarget::Client {
                identity,
                status_callback,
            } => ("Client", identity, status_callback),
            DialTarget::Number {
                number,
                status_callback,
            } => ("Number", number, status_callback),
        };
        let mut noun = BytesStart::new(name);
        if let Some(callback) = status_callback {
            noun.push_attribute(("statusCallback", callback.as_str()));
            noun.push_attribute(("statusCallbackMethod", "POST"));
            noun.push_attribute(("statusCallbackEvent", STATUS_CALLBACK_EVENTS));
        }
        write_text_element(writer, noun, value)?;
    }

    writer.write_event(Event::End(BytesEnd::new("Dial")))?;
    Ok(())
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    text: &str,
) -> Result<(), quick_xml::Error> {
    let end = start.to_end().into_owned();
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(end))?;
    Ok(())
}

impl IntoResponse for VoiceResponse {
    fn into_response(self) -> Response {
        let body = match self.render() {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = %err, "failed to render voice response");
                FALLBACK_HANGUP.to_string()
            }
        };
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
            body,
        )
            .into_response()
    }
}
