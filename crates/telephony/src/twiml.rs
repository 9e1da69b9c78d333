//! Voice markup builder
//!
//! Renders the XML documents the provider executes to drive a call: speak a
//! prompt, gather a keypress or speech, redirect, hang up.

use std::fmt::Write;

/// Builder for a provider voice response document.
#[derive(Debug, Clone, Default)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

#[derive(Debug, Clone)]
enum Verb {
    Say {
        text: String,
        voice: String,
    },
    Gather {
        action: String,
        timeout_secs: u64,
        num_digits: u8,
        prompt: Option<(String, String)>,
    },
    Pause {
        secs: u32,
    },
    Redirect {
        url: String,
    },
    Hangup,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speak text with the given voice.
    pub fn say(mut self, text: &str, voice: &str) -> Self {
        self.verbs.push(Verb::Say {
            text: xml_escape(text),
            voice: voice.to_string(),
        });
        self
    }

    /// Collect a single keypress or a speech utterance, posting the result to
    /// `action`. An optional prompt is spoken inside the gather so the
    /// patient can answer while it plays.
    pub fn gather(
        mut self,
        action: &str,
        timeout_secs: u64,
        num_digits: u8,
        prompt: Option<&str>,
        voice: &str,
    ) -> Self {
        self.verbs.push(Verb::Gather {
            action: xml_escape(action),
            timeout_secs,
            num_digits,
            prompt: prompt.map(|text| (xml_escape(text), voice.to_string())),
        });
        self
    }

    pub fn pause(mut self, secs: u32) -> Self {
        self.verbs.push(Verb::Pause { secs });
        self
    }

    pub fn redirect(mut self, url: &str) -> Self {
        self.verbs.push(Verb::Redirect {
            url: xml_escape(url),
        });
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Render the document.
    pub fn build(self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n");
        for verb in &self.verbs {
            render_verb(&mut xml, verb);
        }
        xml.push_str("</Response>");
        xml
    }

    /// The reminder prompt: gather a yes/no answer, then speak the no-input
    /// closing and hang up if the window elapses.
    pub fn reminder_prompt(
        prompt: &str,
        action_url: &str,
        timeout_secs: u64,
        voice: &str,
        no_input_closing: &str,
    ) -> String {
        VoiceResponse::new()
            .gather(action_url, timeout_secs, 1, Some(prompt), voice)
            .say(no_input_closing, voice)
            .hangup()
            .build()
    }

    /// A definitive closing statement followed by hangup.
    pub fn closing(message: &str, voice: &str) -> String {
        VoiceResponse::new().say(message, voice).hangup().build()
    }
}

fn render_verb(xml: &mut String, verb: &Verb) {
    match verb {
        Verb::Say { text, voice } => {
            let _ = writeln!(xml, "  <Say voice=\"{}\">{}</Say>", voice, text);
        }
        Verb::Gather {
            action,
            timeout_secs,
            num_digits,
            prompt,
        } => {
            let _ = write!(
                xml,
                "  <Gather input=\"dtmf speech\" action=\"{}\" method=\"POST\" \
                 timeout=\"{}\" numDigits=\"{}\" speechTimeout=\"auto\"",
                action, timeout_secs, num_digits
            );
            match prompt {
                Some((text, voice)) => {
                    let _ = writeln!(xml, ">");
                    let _ = writeln!(xml, "    <Say voice=\"{}\">{}</Say>", voice, text);
                    let _ = writeln!(xml, "  </Gather>");
                }
                None => {
                    let _ = writeln!(xml, "/>");
                }
            }
        }
        Verb::Pause { secs } => {
            let _ = writeln!(xml, "  <Pause length=\"{}\"/>", secs);
        }
        Verb::Redirect { url } => {
            let _ = writeln!(xml, "  <Redirect method=\"POST\">{}</Redirect>", url);
        }
        Verb::Hangup => {
            let _ = writeln!(xml, "  <Hangup/>");
        }
    }
}

/// Escape special XML characters.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
