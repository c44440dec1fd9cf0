//! Links `tool_use` blocks with the `tool_result` blocks that answer them

use std::collections::HashMap;

use super::types::{ContentBlock, TranscriptMessage};

/// Tool calls and results that sit outside a page of messages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageToolContext {
    /// Calls before the page still waiting for a result: id -> names, oldest first
    pub carried: HashMap<String, Vec<String>>,
    /// Results after the page that answer calls inside it, counted by id
    pub answered_later: HashMap<String, usize>,
}

/// Cross-link tool calls and results in a single forward pass.
///
/// Each `tool_result` pairs with the nearest preceding unresolved `tool_use`
/// sharing its id: the call is marked `resolved` and the call's name is
/// copied onto the result. Results with no earlier call and calls with no
/// later result are left untouched. Returns the number of pairs made.
pub fn pair_tool_calls(messages: &mut [TranscriptMessage]) -> usize {
    pair_tool_calls_with(messages, &PageToolContext::default())
}

/// Pair a page of messages as if the rest of the transcript were present.
///
/// A result with no earlier call on the page takes its name from the newest
/// carried call with that id. Calls left unresolved on the page are resolved
/// newest first, once per later result counted for their id.
pub fn pair_tool_calls_with(
    messages: &mut [TranscriptMessage],
    context: &PageToolContext,
) -> usize {
    // id -> stack of (message index, block index) of unresolved calls
    let mut pending: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
    let mut carried = context.carried.clone();
    let mut paired = 0;

    for msg_idx in 0..messages.len() {
        for block_idx in 0..messages[msg_idx].block_count() {
            match messages[msg_idx].block(block_idx) {
                Some(ContentBlock::ToolUse { id, resolved, .. }) if !*resolved => {
                    pending
                        .entry(id.clone())
                        .or_default()
                        .push((msg_idx, block_idx));
                }
                Some(ContentBlock::ToolResult { tool_use_id, .. }) => {
                    let name = match pending.get_mut(tool_use_id).and_then(Vec::pop) {
                        Some((call_msg, call_block)) => {
                            mark_resolved(&mut messages[call_msg], call_block)
                        }
                        None => match carried.get_mut(tool_use_id).and_then(Vec::pop) {
                            Some(name) => Some(name),
                            None => continue,
                        },
                    };
                    set_tool_name(&mut messages[msg_idx], block_idx, name);
                    paired += 1;
                }
                _ => {}
            }
        }
    }

    for (id, count) in &context.answered_later {
        let Some(calls) = pending.get_mut(id) else {
            continue;
        };
        for _ in 0..*count {
            let Some((call_msg, call_block)) = calls.pop() else {
                break;
            };
            mark_resolved(&mut messages[call_msg], call_block);
            paired += 1;
        }
    }

    paired
}

fn mark_resolved(message: &mut TranscriptMessage, block_idx: usize) -> Option<String> {
    match message.block_mut(block_idx) {
        Some(ContentBlock::ToolUse { name, resolved, .. }) => {
            *resolved = true;
            Some(name.clone())
        }
        _ => None,
    }
}

fn set_tool_name(message: &mut TranscriptMessage, block_idx: usize, name: Option<String>) {
    if let Some(ContentBlock::ToolResult { tool_name, .. }) = message.block_mut(block_idx) {
        *tool_name = name;
    }
}
