use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

const PASSWORD_ENV: &str = "ECRYPT_PASSWORD";

fn password_from_env() -> Option<Zeroizing<String>> {
    //  ECRYPT_PASSWORD="supersecret" ecrypt encrypt notes.txt
    match std::env::var(PASSWORD_ENV) {
        Ok(pw) if !pw.trim().is_empty() => Some(Zeroizing::new(pw)),
        _ => None,
    }
}

pub fn read_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        return Ok(pw);
    }

    //  stdin (Pipeline)
    //  echo "supersecret" | ecrypt decrypt notes.txt.ecrypt
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.trim().is_empty() {
            return Ok(buf);
        }
    }

    //  Interactive (TTY)
    if io::stdin().is_terminal() {
        let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
        if !pw.trim().is_empty() {
            return Ok(pw);
        }
    }

    bail!("No password provided")
}

pub fn read_new_password_with_confirmation() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        return Ok(pw);
    }

    if !io::stdin().is_terminal() {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        let mut pw1 = Zeroizing::new(String::new());
        let mut pw2 = Zeroizing::new(String::new());

        handle.read_line(&mut pw1)?;
        handle.read_line(&mut pw2)?;

        trim_newline(&mut pw1);
        trim_newline(&mut pw2);

        return confirm(pw1, &pw2);
    }

    let pw1 = Zeroizing::new(rpassword::prompt_password("New password: ")?);
    let pw2 = Zeroizing::new(rpassword::prompt_password("Confirm password: ")?);

    confirm(pw1, &pw2)
}

fn confirm(pw1: Zeroizing<String>, pw2: &str) -> Result<Zeroizing<String>> {
    if pw1.trim().is_empty() {
        bail!("password cannot be empty");
    }

    if pw1.as_str() != pw2 {
        bail!("passwords do not match");
    }

    Ok(pw1)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
