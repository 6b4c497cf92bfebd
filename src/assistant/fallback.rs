//! Canned replies used when the model cannot be reached.

use crate::util::stable_index;

const GENERAL: &[&str] = &[
    "I can't reach the assistant service right now. Meanwhile, write down what you \
     observed, the conditions, and anything that deviated from the plan.",
    "The assistant is offline. A good next step is to list the variables you changed \
     and the controls you ran alongside them.",
    "No connection to the assistant. Consider linking this question to a note so you \
     can follow up once it is back.",
    "The assistant is unavailable. Check the relevant SOP and record which version you \
     followed for this run.",
];

const PROTOCOL: &[&str] = &[
    "The assistant is offline. For protocol questions, start from the latest SOP version \
     and note any step you adjust, including reagent lots and volumes.",
    "I can't answer right now. When adapting a protocol, change one parameter at a time \
     and keep a control run for comparison.",
];

const SAFETY: &[&str] = &[
    "The assistant is offline. For safety questions, consult the safety data sheet and \
     your lab's safety officer before proceeding.",
];

/// Picks a reply for `text`. The same text always gets the same reply.
pub fn reply_for(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    let pool = if ["safety", "hazard", "toxic", "ppe"]
        .iter()
        .any(|word| lowered.contains(word))
    {
        SAFETY
    } else if ["protocol", "sop", "procedure", "step"]
        .iter()
        .any(|word| lowered.contains(word))
    {
        PROTOCOL
    } else {
        GENERAL
    };
    pool[stable_index(text, pool.len())]
}
