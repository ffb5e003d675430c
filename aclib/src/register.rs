//! Shell registration script generation.
//!
//! The emitted snippet wires a program into the completion protocol: the
//! shell function exports the protocol variables, invokes the program, and
//! splits the response on the vertical-tab separator into `COMPREPLY`.

use std::str::FromStr;

use crate::error::Error;

/// Shells a registration script can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    /// GNU bash.
    Bash,
    /// Zsh, via `bashcompinit`.
    Zsh,
}

impl FromStr for Shell {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bash" => Ok(Shell::Bash),
            "zsh" => Ok(Shell::Zsh),
            other => Err(Error::Generic(format!(
                "unsupported shell: {} (expected bash or zsh)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shell::Bash => write!(f, "bash"),
            Shell::Zsh => write!(f, "zsh"),
        }
    }
}

/// Generate the registration script for `prog`.
///
/// Source the output in a shell profile (or pipe it to `eval`) to enable
/// dynamic completion: `eval "$(prog --register bash)"`.
pub fn registration_script(shell: Shell, prog: &str) -> String {
    let func = format!("_{}_complete", prog.replace('-', "_"));
    let mut out = String::new();

    if shell == Shell::Zsh {
        out.push_str("autoload -U +X bashcompinit && bashcompinit\n");
        out.push_str("autoload -U +X compinit && compinit\n\n");
    }

    out.push_str(&format!(
        r#"{func}() {{
    local IFS=$'\013'
    COMPREPLY=( $(IFS="$IFS" \
        COMP_LINE="$COMP_LINE" \
        COMP_POINT="$COMP_POINT" \
        COMP_TYPE="$COMP_TYPE" \
        _ARGCOMPLETE=1 \
        _ARGCOMPLETE_SUPPRESS_SPACE=1 \
        _ARGCOMPLETE_COMP_WORDBREAKS="$COMP_WORDBREAKS" \
        "$1" 2>/dev/null) )
    if [[ $? != 0 ]]; then
        unset COMPREPLY
    fi
}}
complete -o nospace -o default -F {func} {prog}
"#,
        func = func,
        prog = prog
    ));

    out
}
