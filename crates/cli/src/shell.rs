//! Line commands for the interactive shell.

/// One parsed shell line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Put { key: &'a str, value: &'a str },
    Get { key: &'a str },
    Delete { key: &'a str },
    /// Print every entry.
    List,
    /// Print durability status.
    Health,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  put <key> <value>   set a key (the value is the rest of the line)
  get <key>           print a value
  delete <key>        remove a key
  list                print every entry
  health              show durability status
  quit                exit";

/// Parse a trimmed, non-empty input line.
pub fn parse(line: &str) -> Result<Command<'_>, String> {
    let (verb, rest) = split_word(line);
    match verb {
        "put" | "set" => {
            let (key, value) = split_word(rest);
            if key.is_empty() {
                return Err("usage: put <key> <value>".to_string());
            }
            Ok(Command::Put { key, value })
        }
        "get" => single_key(rest, "get").map(|key| Command::Get { key }),
        "delete" | "del" => single_key(rest, "delete").map(|key| Command::Delete { key }),
        "list" | "ls" => Ok(Command::List),
        "health" => Ok(Command::Health),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}', type 'help'")),
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn single_key<'a>(rest: &'a str, verb: &str) -> Result<&'a str, String> {
    let (key, extra) = split_word(rest);
    if key.is_empty() || !extra.is_empty() {
        return Err(format!("usage: {verb} <key>"));
    }
    Ok(key)
}
