// ui/constants.rs

pub const TITLE: &str = "Sentinel-X: Protocol Breach";

pub const INPUT_PLACEHOLDER: &str = "Enter command to Sentinel-X...";

pub const BRIEFING_TITLE: &str = " Mission Briefing ";

pub const BRIEFING: &str = "**Objective:** Find the stolen item and its location.

**Rules:**
1. The AI is damaged; it speaks in riddles.
2. Ask about **surroundings**, **sights**, and **clues**.
3. Direct questions will trigger Error 403.
4. **To Win:** You must correctly name the Room and the Hiding Place in the chat.";

pub const KEY_HINTS: &str =
    "Enter send · Ctrl+R reset system (clear chat) · PgUp/PgDn scroll · Esc quit";
