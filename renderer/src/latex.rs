//! LaTeX text helpers: escaping and the fixed document boilerplate.

use std::borrow::Cow;
use std::io::Write;

/// Escape LaTeX reserved characters. Returns the input untouched when it
/// contains none.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(is_reserved) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '$' => out.push_str("\\$"),
            '&' => out.push_str("\\&"),
            '#' => out.push_str("\\#"),
            '%' => out.push_str("\\%"),
            '_' => out.push_str("\\_"),
            '^' => out.push_str("\\textasciicircum{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '<' => out.push_str("\\textless{}"),
            '>' => out.push_str("\\textgreater{}"),
            '|' => out.push_str("\\textbar{}"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn is_reserved(c: char) -> bool {
    matches!(
        c,
        '\\' | '{' | '}' | '$' | '&' | '#' | '%' | '_' | '^' | '~' | '<' | '>' | '|'
    )
}

/// Write `lines` inside a `minted` environment, untouched.
pub fn write_minted<'a>(
    out: &mut dyn Write,
    options: &str,
    lexer: &str,
    lines: impl IntoIterator<Item = &'a str>,
) -> std::io::Result<()> {
    writeln!(out, "\\begin{{minted}}[{}]{{{}}}", options, lexer)?;
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "\\end{{minted}}")
}

pub fn write_notice(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "%                **** IMPORTANT NOTICE *****")?;
    writeln!(out, "% This LaTeX file was automatically generated by ProTeX")?;
    writeln!(out, "% Any changes made to this file will likely be lost next time")?;
    writeln!(out, "% it is regenerated from its source.")?;
    writeln!(out)
}

pub fn write_preamble(out: &mut dyn Write, style: Option<&str>) -> std::io::Result<()> {
    writeln!(out, "%------------------------ PREAMBLE --------------------------")?;
    match style {
        Some(style) => {
            writeln!(out, "\\documentclass[11pt]{{{}}}", style)?;
            writeln!(out, "\\usepackage{{{}}}", style)?;
        }
        None => writeln!(out, "\\documentclass[11pt]{{article}}")?,
    }
    for line in [
        "\\usepackage{amsmath}",
        "\\usepackage{epsfig}",
        "\\usepackage{minted}",
        "\\textheight     9in",
        "\\topmargin      0pt",
        "\\headsep        1cm",
        "\\headheight     0pt",
        "\\textwidth      6in",
        "\\oddsidemargin  0in",
        "\\evensidemargin 0in",
        "\\marginparpush  0pt",
        "\\pagestyle{myheadings}",
        "\\markboth{}{}",
        "%-------------------------------------------------------------",
        "\\setlength{\\parskip}{0pt}",
        "\\setlength{\\parindent}{0pt}",
        "\\setlength{\\baselineskip}{11pt}",
    ] {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

pub fn write_macros(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "%--------------------- SHORT-HAND MACROS ----------------------")?;
    for (name, body) in [
        ("be", "\\begin{equation}"),
        ("ee", "\\end{equation}"),
        ("bea", "\\begin{eqnarray}"),
        ("eea", "\\end{eqnarray}"),
        ("bi", "\\begin{itemize}"),
        ("ei", "\\end{itemize}"),
        ("bn", "\\begin{enumerate}"),
        ("en", "\\end{enumerate}"),
        ("bd", "\\begin{description}"),
        ("ed", "\\end{description}"),
        ("(", "\\left ("),
        (")", "\\right )"),
        ("[", "\\left ["),
        ("]", "\\right ]"),
        ("<", "\\left \\langle"),
        (">", "\\right \\rangle"),
        ("cI", "{\\cal I}"),
        ("diag", "\\mathop{\\rm diag}"),
        ("tr", "\\mathop{\\rm tr}"),
    ] {
        writeln!(out, "\\def\\{}{{{}}}", name, body)?;
    }
    writeln!(out, "%-------------------------------------------------------------")
}
