// src/console/commands.rs
use crate::{config::is_safe_file_component, models::student::NewStudent};

pub const HELP: &str = "\
Comandos:
  alunos                                              lista os alunos registados
  registrar <matrícula>;<nome>;<apelido>[;<curso>[;<cor RRGGBB>]]
  remover <matrícula>                                 apaga o aluno e as suas presenças
  relatorio [sufixo]                                  exporta todas as presenças para CSV
  cameras                                             lista as câmaras disponíveis
  iniciar [id]                                        começa a leitura de QR (por omissão: 1ª câmara)
  parar                                               termina a leitura
  ajuda                                               mostra esta ajuda
  sair";

/// Uma linha da consola já interpretada.
#[derive(Debug, PartialEq)]
pub enum Command {
    ListStudents,
    Register(NewStudent),
    Remove(String),
    Report(Option<String>),
    Cameras,
    Start(Option<u32>),
    Stop,
    Help,
    Quit,
    Empty,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let command = match name.to_lowercase().as_str() {
        "" => Command::Empty,
        "alunos" => Command::ListStudents,
        "registrar" => Command::Register(parse_new_student(rest)?),
        "remover" if !rest.is_empty() => Command::Remove(rest.to_string()),
        "remover" => return Err("Uso: remover <matrícula>".into()),
        "relatorio" if !is_safe_file_component(rest) => {
            return Err(format!("Sufixo inválido: '{rest}' (sem '/', '\\' nem '..')"))
        }
        "relatorio" => Command::Report((!rest.is_empty()).then(|| rest.to_string())),
        "cameras" => Command::Cameras,
        "iniciar" if rest.is_empty() => Command::Start(None),
        "iniciar" => Command::Start(Some(
            rest.parse()
                .map_err(|_| format!("Id de câmara inválido: '{rest}'"))?,
        )),
        "parar" => Command::Stop,
        "ajuda" | "?" => Command::Help,
        "sair" => Command::Quit,
        other => return Err(format!("Comando desconhecido: '{other}' (escreva 'ajuda')")),
    };
    Ok(command)
}

// Campos separados por ';' porque nomes e cursos podem ter espaços
fn parse_new_student(rest: &str) -> Result<NewStudent, String> {
    let fields: Vec<&str> = rest.split(';').map(str::trim).collect();
    let [code, first_name, last_name, extra @ ..] = fields.as_slice() else {
        return Err("Uso: registrar <matrícula>;<nome>;<apelido>[;<curso>[;<cor>]]".into());
    };
    if extra.len() > 2 {
        return Err("Demasiados campos em 'registrar'".into());
    }

    let optional = |i: usize| extra.get(i).filter(|v| !v.is_empty()).map(|v| v.to_string());
    Ok(NewStudent {
        code: code.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        course: optional(0),
        qr_color: optional(1),
    })
}
