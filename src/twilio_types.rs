pub fn wrap_twiml(twiml: String) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{twiml}")
}

mod twiml {
    use xmlserde_derives::XmlSerialize;

    #[derive(PartialEq, Eq, XmlSerialize)]
    #[xmlserde(root = b"Response")]
    pub struct Response {
        #[xmlserde(ty = "untag")]
        pub actions: Vec<ResponseAction>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum ResponseAction {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
        #[xmlserde(name = b"Gather")]
        Gather(GatherAction),
        #[xmlserde(name = b"Pause")]
        Pause(PauseAction),
        #[xmlserde(name = b"Redirect")]
        Redirect(RedirectAction),
        #[xmlserde(name = b"Hangup")]
        Hangup(HangupAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct SayAction {
        #[xmlserde(ty = "text")]
        pub text: String,
        #[xmlserde(name = b"voice", ty = "attr")]
        pub voice: Option<String>,
        #[xmlserde(name = b"loop", ty = "attr")]
        pub lp: Option<u16>,
        #[xmlserde(name = b"language", ty = "attr")]
        pub language: Option<String>,
    }

    /// Speech-input gathering directive.  Children are the spoken prompt plus
    /// hidden `Parameter` elements the platform echoes back on the next turn.
    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct GatherAction {
        #[xmlserde(name = b"input", ty = "attr")]
        pub input: Option<String>,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u16>,
        #[xmlserde(name = b"speechTimeout", ty = "attr")]
        pub speech_timeout: Option<u16>,
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
        #[xmlserde(ty = "untag")]
        pub children: Vec<GatherChild>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum GatherChild {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
        #[xmlserde(name = b"Parameter")]
        Parameter(ParameterElement),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct ParameterElement {
        #[xmlserde(name = b"name", ty = "attr")]
        pub name: String,
        #[xmlserde(name = b"value", ty = "attr")]
        pub value: String,
    }

    impl ParameterElement {
        /// Attribute values are written verbatim by the serializer, unlike
        /// element text, so anything caller-supplied must be entity-escaped
        /// here to keep the markup well formed.
        pub fn new(name: &str, value: &str) -> Self {
            Self {
                name: name.to_string(),
                value: escape_attr(value),
            }
        }
    }

    fn escape_attr(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&apos;"),
                _ => out.push(c),
            }
        }
        out
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct PauseAction {
        #[xmlserde(name = b"length", ty = "attr")]
        pub length: Option<u16>,
        #[xmlserde(ty = "text")]
        pub text: String,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct RedirectAction {
        #[xmlserde(ty = "text")]
        pub url: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct HangupAction {
        #[xmlserde(ty = "text")]
        pub text: String,
    }
}
pub use twiml::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_serializes_attrs_and_children() {
        let gather = GatherAction {
            input: Some("speech".to_string()),
            timeout: Some(5),
            speech_timeout: Some(2),
            action: "/twilio-twiml".to_string(),
            method: Some("POST".to_string()),
            children: vec![
                GatherChild::Say(SayAction {
                    text: "Please say your full name.".to_string(),
                    voice: Some("alice".to_string()),
                    ..Default::default()
                }),
                GatherChild::Parameter(ParameterElement {
                    name: "gathering".to_string(),
                    value: "name".to_string(),
                }),
            ],
        };
        let response = Response {
            actions: vec![ResponseAction::Gather(gather)],
        };
        let xml = xmlserde::xml_serialize(response);
        assert!(xml.contains("input=\"speech\""));
        assert!(xml.contains("timeout=\"5\""));
        assert!(xml.contains("speechTimeout=\"2\""));
        assert!(xml.contains("action=\"/twilio-twiml\""));
        assert!(xml.contains("Please say your full name."));
        assert!(xml.contains("name=\"gathering\""));
        assert!(xml.contains("value=\"name\""));
    }

    #[test]
    fn parameter_attribute_values_are_entity_escaped() {
        let gather = GatherAction {
            action: "/twilio-twiml".to_string(),
            children: vec![GatherChild::Parameter(ParameterElement::new(
                "job",
                "Fish & Chips \"Chef\"",
            ))],
            ..Default::default()
        };
        let response = Response {
            actions: vec![ResponseAction::Gather(gather)],
        };
        let xml = xmlserde::xml_serialize(response);
        assert!(xml.contains("value=\"Fish &amp; Chips &quot;Chef&quot;\""));
        assert!(!xml.contains("Chips \"Chef"), "raw quote would break the attribute");
    }

    #[test]
    fn terminal_response_serializes_say_pause_hangup() {
        let response = Response {
            actions: vec![
                ResponseAction::Say(SayAction {
                    text: "Thank you.".to_string(),
                    voice: Some("alice".to_string()),
                    ..Default::default()
                }),
                ResponseAction::Pause(PauseAction {
                    length: Some(1),
                    ..Default::default()
                }),
                ResponseAction::Hangup(HangupAction::default()),
            ],
        };
        let xml = wrap_twiml(xmlserde::xml_serialize(response));
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Say"));
        assert!(xml.contains("length=\"1\""));
        assert!(xml.contains("<Hangup"));
    }

    #[test]
    fn redirect_carries_url_as_text() {
        let response = Response {
            actions: vec![ResponseAction::Redirect(RedirectAction {
                url: "/twilio-twiml?retry=1".to_string(),
                ..Default::default()
            })],
        };
        let xml = xmlserde::xml_serialize(response);
        assert!(xml.contains("<Redirect>/twilio-twiml?retry=1</Redirect>"));
    }
}
