//! Merges heterogeneous provider payloads into canonical word records.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use super::payload::{ProviderPayload, TranslateCandidate};
use super::types::{AnswerOption, WordRecord, MAX_OPTIONS};

#[derive(Debug, Default)]
struct RepeatMeta {
    repeat_at: Option<String>,
    repeat_interval: Option<i64>,
    translates: Vec<TranslateCandidate>,
}

impl RepeatMeta {
    fn absorb(&mut self, repeat_at: Option<&String>, repeat_interval: Option<i64>) {
        if self.repeat_at.is_none() {
            self.repeat_at = repeat_at.cloned();
        }
        if self.repeat_interval.is_none() {
            self.repeat_interval = repeat_interval;
        }
    }
}

#[derive(Debug)]
struct Primary {
    word_id: String,
    prompt: String,
    correct_id: String,
    correct_value: String,
    progress: u8,
    translates: Vec<TranslateCandidate>,
}

/// A locally stored word quizzed in the reverse direction.
#[derive(Debug, Clone)]
pub struct ReverseCard {
    pub word_id: String,
    pub word: String,
    pub translation: String,
}

/// Builds the quiz queue from one or more provider payloads.
///
/// Training payloads are the primary source. Dictionary entries only become
/// primaries when no training payload was supplied at all, and then at most
/// `dictionary_batch` of them. Dictionary and rich payloads always feed the
/// repeat-metadata lookup.
pub fn reconcile<R: Rng + ?Sized>(
    payloads: &[ProviderPayload],
    dictionary_batch: usize,
    rng: &mut R,
) -> Vec<WordRecord> {
    let lookup = build_lookup(payloads);

    let has_training = payloads
        .iter()
        .any(|p| matches!(p, ProviderPayload::Training(_)));

    let mut candidates = Vec::new();
    if has_training {
        for payload in payloads {
            if let ProviderPayload::Training(words) = payload {
                for w in words {
                    candidates.push((
                        w.word_id.clone(),
                        w.word_value.clone(),
                        w.translate_id.clone(),
                        w.correct_translate_value.clone(),
                        w.progress_percent,
                        w.translates.clone(),
                    ));
                }
            }
        }
    } else {
        let entries = payloads.iter().flat_map(|p| match p {
            ProviderPayload::Dictionary(entries) => entries.as_slice(),
            _ => &[],
        });
        for e in entries.take(dictionary_batch) {
            let correct_id = e.translate_id.clone().or_else(|| e.id.clone());
            candidates.push((
                e.id.clone(),
                e.word.clone(),
                correct_id,
                e.translate.clone(),
                0,
                Vec::new(),
            ));
        }
    }

    let mut seen = HashSet::new();
    let mut primaries = Vec::with_capacity(candidates.len());
    for (word_id, prompt, correct_id, correct_value, progress, translates) in candidates {
        let Some(word_id) = word_id else {
            tracing::warn!(prompt = %prompt, "Skipping word without id");
            continue;
        };
        let Some(correct_id) = correct_id else {
            tracing::warn!(word_id = %word_id, "Skipping word without correct option id");
            continue;
        };
        if prompt.is_empty() || correct_value.is_empty() {
            tracing::warn!(word_id = %word_id, "Skipping word with empty prompt or answer");
            continue;
        }
        if !seen.insert(word_id.clone()) {
            tracing::debug!(word_id = %word_id, "Dropping duplicate word");
            continue;
        }
        primaries.push(Primary {
            word_id,
            prompt,
            correct_id,
            correct_value,
            progress,
            translates,
        });
    }

    build_records(primaries, &lookup, rng)
}

/// Builds reverse-direction records (translation shown, word chosen) with
/// distractors drawn from the other cards.
pub fn reverse_records<R: Rng + ?Sized>(cards: Vec<ReverseCard>, rng: &mut R) -> Vec<WordRecord> {
    let mut seen = HashSet::new();
    let primaries = cards
        .into_iter()
        .filter(|c| !c.word.is_empty() && !c.translation.is_empty())
        .filter(|c| seen.insert(c.word_id.clone()))
        .map(|c| Primary {
            correct_id: c.word_id.clone(),
            word_id: c.word_id,
            prompt: c.translation,
            correct_value: c.word,
            progress: 0,
            translates: Vec::new(),
        })
        .collect();
    build_records(primaries, &HashMap::new(), rng)
}

fn build_lookup(payloads: &[ProviderPayload]) -> HashMap<String, RepeatMeta> {
    let mut lookup: HashMap<String, RepeatMeta> = HashMap::new();
    for payload in payloads {
        match payload {
            ProviderPayload::Dictionary(entries) => {
                for e in entries {
                    if let Some(id) = &e.id {
                        lookup
                            .entry(id.clone())
                            .or_default()
                            .absorb(e.repeat_at.as_ref(), e.repeat_interval);
                    }
                }
            }
            ProviderPayload::Rich(entries) => {
                for e in entries {
                    if let Some(id) = &e.word_id {
                        let meta = lookup.entry(id.clone()).or_default();
                        meta.absorb(e.repeat_at.as_ref(), e.repeat_interval);
                        meta.translates.extend(e.translates.iter().cloned());
                    }
                }
            }
            ProviderPayload::Training(_) => {}
        }
    }
    lookup
}

fn build_records<R: Rng + ?Sized>(
    primaries: Vec<Primary>,
    lookup: &HashMap<String, RepeatMeta>,
    rng: &mut R,
) -> Vec<WordRecord> {
    let fillers: Vec<(String, String, String)> = primaries
        .iter()
        .map(|p| (p.word_id.clone(), p.correct_id.clone(), p.correct_value.clone()))
        .collect();

    primaries
        .into_iter()
        .map(|p| {
            let meta = lookup.get(&p.word_id);
            let mut pool = OptionPool::new(&p.correct_id, &p.correct_value);

            let rich = p
                .translates
                .iter()
                .chain(meta.into_iter().flat_map(|m| m.translates.iter()));
            for t in rich {
                if pool.is_full() {
                    break;
                }
                if let Some(id) = &t.id {
                    pool.offer(id, &t.value);
                }
            }

            if !pool.is_full() {
                let mut others: Vec<&(String, String, String)> =
                    fillers.iter().filter(|(id, _, _)| *id != p.word_id).collect();
                others.shuffle(rng);
                for (_, option_id, value) in others {
                    if pool.is_full() {
                        break;
                    }
                    pool.offer(option_id, value);
                }
            }

            WordRecord {
                word_id: p.word_id,
                prompt: p.prompt,
                correct_option_id: p.correct_id,
                correct_option_value: p.correct_value,
                options: pool.options,
                progress_percent: p.progress,
                remote_repeat_at: meta.and_then(|m| m.repeat_at.clone()),
                remote_repeat_interval_minutes: meta.and_then(|m| m.repeat_interval),
            }
        })
        .collect()
}

struct OptionPool {
    options: Vec<AnswerOption>,
    ids: HashSet<String>,
    values: HashSet<String>,
}

impl OptionPool {
    fn new(correct_id: &str, correct_value: &str) -> Self {
        let mut pool = Self {
            options: Vec::with_capacity(MAX_OPTIONS),
            ids: HashSet::new(),
            values: HashSet::new(),
        };
        pool.offer(correct_id, correct_value);
        pool
    }

    fn is_full(&self) -> bool {
        self.options.len() >= MAX_OPTIONS
    }

    /// Adds the option unless its id or display text is already present.
    fn offer(&mut self, id: &str, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || self.is_full() {
            return false;
        }
        let text_key = value.to_lowercase();
        if self.ids.contains(id) || self.values.contains(&text_key) {
            return false;
        }
        self.ids.insert(id.to_string());
        self.values.insert(text_key);
        self.options.push(AnswerOption::new(id, value));
        true
    }
}
