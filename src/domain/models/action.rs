#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Clear(),
    Export(),
    Quit(),
    Regenerate(),
    Send(String),
    SetSystemPrompt(String),
    Stop(),
}
