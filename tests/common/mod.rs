//! Scripted stand-in for `ssh -s HOST netconf`.
//!
//! The script ignores its ssh arguments, greets with a base:1.0 hello and
//! answers each `<rpc>` line with `<ok/>` unless a canned reply matches the
//! operation. Replies echo the request's `message-id`. Every rpc it receives
//! is appended to `rpcs.log` next to it.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const DIFF_TEXT: &str = "[edit interfaces ge-0/0/0 unit 0 family inet]
-       address 192.0.2.1/24;
+       address 192.0.2.2/24;";

pub fn rpc_error(message: &str) -> String {
    format!(
        "<rpc-reply><rpc-error><error-type>protocol</error-type>\
         <error-severity>error</error-severity>\
         <error-message>{}</error-message></rpc-error></rpc-reply>",
        message
    )
}

pub struct FakeDevice {
    dir: TempDir,
    overrides: Vec<(String, String)>,
    delays: Vec<(String, u64)>,
    foreign_ids: Vec<String>,
    diff: Option<String>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            overrides: Vec::new(),
            delays: Vec::new(),
            foreign_ids: Vec::new(),
            diff: Some(DIFF_TEXT.to_string()),
        }
    }

    /// Answer rpcs whose line contains `needle` with `reply`
    pub fn reply(mut self, needle: &str, reply: String) -> Self {
        self.overrides.push((needle.to_string(), reply));
        self
    }

    /// Hold the reply to rpcs containing `needle` for `secs` seconds
    pub fn delay(mut self, needle: &str, secs: u64) -> Self {
        self.delays.push((needle.to_string(), secs));
        self
    }

    /// Answer rpcs containing `needle` under a message-id nobody asked for
    pub fn foreign_message_id(mut self, needle: &str) -> Self {
        self.foreign_ids.push(needle.to_string());
        self
    }

    pub fn without_diff(mut self) -> Self {
        self.diff = None;
        self
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn rpc_log(&self) -> PathBuf {
        self.dir.path().join("rpcs.log")
    }

    /// Operations received, in order
    pub fn rpcs(&self) -> Vec<String> {
        fs::read_to_string(self.rpc_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Write the script and return its path
    #[cfg(unix)]
    pub fn install(&self) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let diff_reply = match self.diff {
            Some(ref diff) => format!(
                "<rpc-reply><configuration-information><configuration-output>\n{}\n</configuration-output></configuration-information></rpc-reply>",
                diff
            ),
            None => "<rpc-reply><configuration-information><configuration-output>\n</configuration-output></configuration-information></rpc-reply>".to_string(),
        };

        let mut cases = String::new();
        for (needle, reply) in &self.overrides {
            cases.push_str(&format!(
                "    *'{}'*) reply='{}' ;;\n",
                needle, reply
            ));
        }

        let mut delays = String::new();
        for (needle, secs) in &self.delays {
            delays.push_str(&format!("    *'{}'*) sleep {} ;;\n", needle, secs));
        }

        let mut foreign_ids = String::new();
        for needle in &self.foreign_ids {
            foreign_ids.push_str(&format!("    *'{}'*) mid=999 ;;\n", needle));
        }

        let script = format!(
            r#"#!/bin/sh
printf '%s\n%s\n' '<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities><session-id>4242</session-id></hello>' ']]>]]>'
while IFS= read -r line; do
  case "$line" in
    *'<rpc '*) ;;
    *) continue ;;
  esac
  op=${{line#*"<rpc "}}
  op=${{op#*">"}}
  op=${{op%"</rpc>"*}}
  printf '%s\n' "$op" >> '{log}'
  mid=${{line#*'message-id="'}}
  mid=${{mid%%'"'*}}
  last=
  case "$line" in
{cases}    *'<get-configuration'*) reply='{diff_reply}' ;;
    *'<close-session/>'*) reply='<rpc-reply><ok/></rpc-reply>'; last=1 ;;
    *) reply='<rpc-reply><ok/></rpc-reply>' ;;
  esac
  case "$line" in
{foreign_ids}    *) ;;
  esac
  case "$line" in
{delays}    *) ;;
  esac
  reply="<rpc-reply message-id=\"$mid\"${{reply#<rpc-reply}}"
  printf '%s\n%s\n' "$reply" ']]>]]>'
  [ -n "$last" ] && exit 0
done
"#,
            log = self.rpc_log().display(),
            cases = cases,
            foreign_ids = foreign_ids,
            delays = delays,
            diff_reply = diff_reply,
        );

        let path = self.dir.path().join("fake-ssh");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
