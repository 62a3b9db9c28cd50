use fundtrace::{
    collect_statement_files, find_hidden_partners, get_interactions, get_known_distribution,
    get_trend, ingest_batch, AmountUnit, CaseContext, PersonRole, TransactionStore,
    DEFAULT_TOP_K, DEFAULT_WINDOW_MINUTES,
};
use serde_json::json;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const USAGE: &str = "\
fundtrace_case <command> [options]

commands:
  ingest        --db <path> --case-id <id> --case-name <name> --role <盗窃人员|收脏人员|排查人员>
                --source <bill-source> (--file <path> ... | --dir <path>) [--unit <元|角|分>]
  interactions  --db <path> --case-id <id> [--known-only]
  partners      --db <path> --case-id <id> [--window-minutes <n>] [--top-k <n>]
  trend         --db <path> --case-id <id> [--owner <name>] [--min-yuan <n>] [--max-yuan <n>]
";

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn arg_values(args: &[String], flag: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        if arg == flag {
            if let Some(value) = iter.peek() {
                out.push((*value).clone());
            }
        }
    }
    out
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn required(args: &[String], flag: &str) -> Result<String, String> {
    arg_value(args, flag).ok_or_else(|| format!("{flag} 必填"))
}

fn parse_unit(raw: &str) -> Result<AmountUnit, String> {
    match raw.trim() {
        "元" | "base" => Ok(AmountUnit::Base),
        "角" | "tenth" => Ok(AmountUnit::Tenth),
        "分" | "hundredth" => Ok(AmountUnit::Hundredth),
        other => Err(format!("无法识别的金额单位: {other}")),
    }
}

fn parse_i64(args: &[String], flag: &str) -> Result<Option<i64>, String> {
    match arg_value(args, flag) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("{flag} 需要整数，收到: {raw}")),
    }
}

fn open_store(args: &[String]) -> Result<(TransactionStore, String), String> {
    let db = required(args, "--db")?;
    let case_id = required(args, "--case-id")?;
    let store = TransactionStore::open(Path::new(&db)).map_err(|e| e.to_string())?;
    Ok((store, case_id))
}

fn run_ingest(args: &[String]) -> Result<serde_json::Value, String> {
    let (mut store, case_id) = open_store(args)?;
    let role = PersonRole::parse(&required(args, "--role")?).map_err(|e| e.to_string())?;
    let case = CaseContext {
        case_name: required(args, "--case-name")?,
        case_id,
        person_role: role,
        bill_source: required(args, "--source")?,
    };
    let unit = match arg_value(args, "--unit") {
        Some(raw) => Some(parse_unit(&raw)?),
        None => None,
    };

    let mut paths: Vec<PathBuf> = arg_values(args, "--file").into_iter().map(PathBuf::from).collect();
    if let Some(dir) = arg_value(args, "--dir") {
        let discovered =
            collect_statement_files(Path::new(&dir)).map_err(|e| e.to_string())?;
        paths.extend(discovered);
    }
    if paths.is_empty() {
        return Err("需要 --file 或 --dir 指定账单文件".to_string());
    }

    let report = ingest_batch(&mut store, &paths, &case, unit, None);
    serde_json::to_value(&report).map_err(|e| e.to_string())
}

fn run_interactions(args: &[String]) -> Result<serde_json::Value, String> {
    let (store, case_id) = open_store(args)?;
    let edges = if has_flag(args, "--known-only") {
        get_known_distribution(&store, &case_id)
    } else {
        get_interactions(&store, &case_id)
    }
    .map_err(|e| e.to_string())?;
    serde_json::to_value(&edges).map_err(|e| e.to_string())
}

fn run_partners(args: &[String]) -> Result<serde_json::Value, String> {
    let (store, case_id) = open_store(args)?;
    let window = parse_i64(args, "--window-minutes")?.unwrap_or(DEFAULT_WINDOW_MINUTES);
    let top_k = parse_i64(args, "--top-k")?
        .map(|n| n.max(0) as usize)
        .unwrap_or(DEFAULT_TOP_K);
    let partners =
        find_hidden_partners(&store, &case_id, window, top_k).map_err(|e| e.to_string())?;
    serde_json::to_value(&partners).map_err(|e| e.to_string())
}

fn run_trend(args: &[String]) -> Result<serde_json::Value, String> {
    let (store, case_id) = open_store(args)?;
    let owner = arg_value(args, "--owner");
    let min_abs = parse_i64(args, "--min-yuan")?.map(|y| y * 100);
    let max_abs = parse_i64(args, "--max-yuan")?.map(|y| y * 100);
    let trend = get_trend(&store, &case_id, owner.as_deref(), min_abs, max_abs)
        .map_err(|e| e.to_string())?;
    serde_json::to_value(&trend).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = args.first().cloned() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let rest = &args[1..];

    let result = match command.as_str() {
        "ingest" => run_ingest(rest),
        "interactions" => run_interactions(rest),
        "partners" => run_partners(rest),
        "trend" => run_trend(rest),
        "--help" | "help" => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        other => Err(format!("未知子命令: {other}\n\n{USAGE}")),
    };

    match result {
        Ok(payload) => {
            match serde_json::to_string_pretty(&json!({ "status": "success", "payload": payload }))
            {
                Ok(out) => {
                    println!("{out}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", json!({ "status": "error", "message": e.to_string() }));
                    ExitCode::FAILURE
                }
            }
        }
        Err(message) => {
            eprintln!("{}", json!({ "status": "error", "message": message }));
            ExitCode::FAILURE
        }
    }
}
