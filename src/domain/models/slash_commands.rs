#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let mut args = text
            .trim()
            .split(' ')
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        let prefix = args[0].to_string();
        args.remove(0);

        let cmd = SlashCommand {
            command: prefix,
            args,
        };
        if cmd.is_quit()
            || cmd.is_stop()
            || cmd.is_regenerate()
            || cmd.is_clear()
            || cmd.is_export()
            || cmd.is_system_prompt()
            || cmd.is_help()
        {
            return Some(cmd);
        }

        return None;
    }

    /// Remaining text after the command, as typed.
    pub fn text(&self) -> String {
        return self.args.join(" ").trim().to_string();
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_stop(&self) -> bool {
        return ["/s", "/stop"].contains(&self.command.as_str());
    }

    pub fn is_regenerate(&self) -> bool {
        return ["/r", "/regenerate"].contains(&self.command.as_str());
    }

    pub fn is_clear(&self) -> bool {
        return ["/c", "/clear"].contains(&self.command.as_str());
    }

    pub fn is_export(&self) -> bool {
        return ["/e", "/export"].contains(&self.command.as_str());
    }

    pub fn is_system_prompt(&self) -> bool {
        return ["/system"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }
}
