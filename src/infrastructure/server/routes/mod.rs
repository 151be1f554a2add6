pub(super) mod briefing;
