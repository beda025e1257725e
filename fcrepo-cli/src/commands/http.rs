use std::io::Read;

use clap::{Args, ValueEnum};
use fcrepo::{
    api::{Payload, Request},
    content,
    path::{resolve_local_path, RemotePath},
};

use crate::{errors::CliError, App, CliResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    fn request(self, path: RemotePath) -> Request {
        match self {
            Self::Get => Request::get(path),
            Self::Head => Request::head(path),
            Self::Post => Request::post(path),
            Self::Put => Request::put(path),
            Self::Patch => Request::patch(path),
            Self::Delete => Request::delete(path),
        }
    }
}

#[derive(Debug, Args)]
pub struct HttpArgs {
    pub method: HttpMethod,

    pub path: Option<String>,

    /// Extra header, as `Name: value`
    #[arg(short = 'H', long)]
    pub header: Vec<String>,

    /// What to print: H request headers, B request body, h response
    /// headers, b response body
    #[arg(short = 'P', long, default_value = "hb")]
    pub print: String,

    /// File to send as the body, or `stdin`
    #[arg(short = '@', long, conflicts_with = "data_string")]
    pub data_binary: Option<String>,

    /// Turtle to send as the body, with the configured prefixes
    #[arg(short = 't', long)]
    pub data_string: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Print {
    request_headers: bool,
    request_body: bool,
    response_headers: bool,
    response_body: bool,
}

impl Print {
    fn parse(flags: &str) -> Self {
        Self {
            request_headers: flags.contains('H'),
            request_body: flags.contains('B'),
            response_headers: flags.contains('h'),
            response_body: flags.contains('b'),
        }
    }
}

pub(super) async fn run(app: &App, args: HttpArgs) -> CliResult<()> {
    let fs = app.fs()?;
    let path = app.resolve(args.path.as_deref())?;
    let print = Print::parse(&args.print);

    let mut req = args.method.request(path.clone());

    for line in &args.header {
        req = req.raw_header(line)?;
    }

    if let Some(data) = &args.data_binary {
        if data.eq_ignore_ascii_case("stdin") || data == "-" {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            req = req.payload(body);
        } else {
            let file = resolve_local_path(data)?;
            if !file.is_file() {
                return Err(CliError::InvalidFile(file));
            }

            let headers = content::file_headers(&file, None, &req.headers).await?;
            req.headers.extend(headers);
            req = req.payload(Payload::File(file));
        }
    }

    if let Some(turtle) = &args.data_string {
        if !req.headers.contains_key("content-type") {
            req = req.raw_header("Content-Type: text/turtle")?;
        }
        req = req.payload(format!("{}{turtle}", fs.prefixes().to_turtle()));
    }

    if print.request_headers {
        let tx = fs.session().transaction();
        let url = fs.session().endpoint().url(&path, tx.as_deref())?;

        println!("{} {url}", args.method);
        for (name, value) in &req.headers {
            println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
        }
        println!();
    }

    if print.request_body {
        match &req.payload {
            Payload::Empty => {}
            Payload::Bytes(bytes) => println!("{}\n", String::from_utf8_lossy(bytes)),
            Payload::File(file) => println!("<{}>\n", file.display()),
        }
    }

    let res = fs.send(&req).await?;

    if print.response_headers {
        println!("HTTP {}", res.status);
        for (name, value) in &res.headers {
            println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
        }
        println!();
    }

    if print.response_body && !res.body.is_empty() {
        println!("{}\n", res.text());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_flags_are_case_sensitive() {
        assert_eq!(
            Print::parse("hb"),
            Print {
                response_headers: true,
                response_body: true,
                ..Print::default()
            }
        );
        assert_eq!(
            Print::parse("HB"),
            Print {
                request_headers: true,
                request_body: true,
                ..Print::default()
            }
        );
        assert_eq!(Print::parse(""), Print::default());
    }
}
