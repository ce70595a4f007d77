//! Text → IPA phonemes with espeak-ng.
//!
//! Two drivers share the [`Phonemizer`] trait:
//!
//! | Driver               | Availability          | How                               |
//! |----------------------|-----------------------|-----------------------------------|
//! | [`EspeakCommand`]    | always                | runs `espeak-ng -q --ipa -v <lang>` |
//! | [`EspeakLibrary`]    | `espeak` feature      | calls the `libespeak-ng` C API    |
//!
//! The library driver avoids one process spawn per chunk; both produce the
//! same IPA because they drive the same translation engine.

use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::voices::Language;

/// Converts one chunk of normalised text into raw IPA.
pub trait Phonemizer: Send + Sync {
    fn phonemize(&self, text: &str, language: Language) -> Result<String>;
}

/// Pick the best driver compiled into this build.
#[cfg(feature = "espeak")]
pub fn default_phonemizer() -> Box<dyn Phonemizer> {
    Box::new(EspeakLibrary)
}

/// Pick the best driver compiled into this build.
#[cfg(not(feature = "espeak"))]
pub fn default_phonemizer() -> Box<dyn Phonemizer> {
    Box::new(EspeakCommand::default())
}

// ─────────────────────────────────────────────────────────────────────────────
// Subprocess driver
// ─────────────────────────────────────────────────────────────────────────────

/// Runs the `espeak-ng` executable once per call.
#[derive(Debug, Clone)]
pub struct EspeakCommand {
    program: String,
}

impl Default for EspeakCommand {
    fn default() -> Self {
        Self { program: "espeak-ng".to_string() }
    }
}

impl EspeakCommand {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    /// `true` when the executable can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success())
    }
}

impl Phonemizer for EspeakCommand {
    fn phonemize(&self, text: &str, language: Language) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let out = Command::new(&self.program)
            .args(["-q", "--ipa", "-v", language.espeak_voice()])
            .arg(text)
            .output()
            .with_context(|| format!("Cannot run '{}' — is espeak-ng installed?", self.program))?;

        if !out.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }

        let stdout = String::from_utf8(out.stdout).context("espeak-ng returned non-UTF-8 phonemes")?;
        Ok(join_clauses(&stdout))
    }
}

/// espeak prints one clause per line; the model wants one line.
fn join_clauses(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Library driver
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "espeak")]
pub use ffi::EspeakLibrary;

#[cfg(feature = "espeak")]
mod ffi {
    use std::{
        ffi::{CStr, CString},
        os::raw::{c_char, c_int, c_void},
        sync::Mutex,
    };

    use anyhow::{anyhow, Result};
    use once_cell::sync::OnceCell;

    use super::Phonemizer;
    use crate::voices::Language;

    // Linked by build.rs.
    extern "C" {
        fn espeak_ng_InitializePath(path: *const c_char);
        fn espeak_ng_Initialize(context: *mut c_void) -> c_int;
        fn espeak_ng_SetVoiceByName(name: *const c_char) -> c_int;
        fn espeak_TextToPhonemes(
            textptr: *mut *const c_void,
            textmode: c_int,
            phonememode: c_int,
        ) -> *const c_char;
    }

    const CHARS_UTF8: c_int = 1;
    const PHONEMES_IPA: c_int = 0x02;

    /// espeak-ng keeps global state; every call goes through this lock,
    /// which also remembers the currently selected voice.
    static STATE: Mutex<Option<Language>> = Mutex::new(None);
    static INIT: OnceCell<std::result::Result<(), String>> = OnceCell::new();

    fn init() -> std::result::Result<(), String> {
        // SAFETY: called once under STATE; NULL selects the compiled-in data path.
        let status = unsafe {
            espeak_ng_InitializePath(std::ptr::null());
            espeak_ng_Initialize(std::ptr::null_mut())
        };
        if status != 0 {
            return Err(format!("espeak_ng_Initialize failed (status {status:#010x})"));
        }
        Ok(())
    }

    /// In-process espeak-ng.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct EspeakLibrary;

    impl Phonemizer for EspeakLibrary {
        fn phonemize(&self, text: &str, language: Language) -> Result<String> {
            let mut current_voice = STATE.lock().unwrap_or_else(|p| p.into_inner());
            INIT.get_or_init(init).as_ref().map_err(|e| anyhow!("espeak-ng: {e}"))?;

            if *current_voice != Some(language) {
                let name = CString::new(language.espeak_voice())?;
                // SAFETY: library initialised above; name outlives the call.
                let rc = unsafe { espeak_ng_SetVoiceByName(name.as_ptr()) };
                if rc != 0 {
                    return Err(anyhow!(
                        "espeak_ng_SetVoiceByName(\"{}\") failed (rc {rc})",
                        language.espeak_voice()
                    ));
                }
                *current_voice = Some(language);
            }

            let text_c = CString::new(text).map_err(|_| anyhow!("text contains a null byte"))?;
            let mut cursor: *const c_void = text_c.as_ptr() as *const c_void;
            let mut clauses: Vec<String> = Vec::new();

            // SAFETY: cursor points into text_c, which lives for the whole loop;
            // the returned buffer is copied before the next call.
            unsafe {
                while !cursor.is_null() {
                    let ptr = espeak_TextToPhonemes(&mut cursor, CHARS_UTF8, PHONEMES_IPA);
                    if ptr.is_null() {
                        continue;
                    }
                    let clause = CStr::from_ptr(ptr)
                        .to_str()
                        .map_err(|_| anyhow!("espeak-ng returned non-UTF-8 phonemes"))?
                        .trim();
                    if !clause.is_empty() {
                        clauses.push(clause.to_owned());
                    }
                }
            }

            Ok(clauses.join(" "))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn phonemizes_both_accents() {
            let us = EspeakLibrary.phonemize("Hello world", Language::AmericanEnglish).unwrap();
            let gb = EspeakLibrary.phonemize("Hello world", Language::BritishEnglish).unwrap();
            assert!(!us.is_empty());
            assert!(!gb.is_empty());
        }
    }
}
